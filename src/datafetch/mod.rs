mod arrow_convert;
mod error;
mod fetcher;
mod native;
mod parallel;
mod types;

pub use arrow_convert::{pg_type_to_arrow, sqlite_type_to_arrow, ColumnBuilder};
pub use error::DataFetchError;
pub use fetcher::DataFetcher;
pub use native::{copy_table_binary, CopyBinaryDecoder, NativeFetcher};
pub use parallel::{split_range, ParallelFetcher, RangePartition};
pub use types::{FetchedTable, SelectPlan, TableMetadata};
