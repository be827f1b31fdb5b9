use arrowhaul::datafetch::FetchedTable;
use arrowhaul::storage::{FileFormat, FilesystemStorage, StorageError, StorageManager, TableLocation};
use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tempfile::TempDir;

fn orders() -> FetchedTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("region", DataType::Utf8, true),
        Field::new("year", DataType::Int64, true),
        Field::new("amount", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["eu", "eu", "us", "us"])),
            Arc::new(Int64Array::from(vec![2023, 2024, 2023, 2024])),
            Arc::new(Float64Array::from(vec![1.5, 2.5, 3.5, 4.5])),
        ],
    )
    .unwrap();
    FetchedTable::new(schema, vec![batch])
}

#[tokio::test(flavor = "multi_thread")]
async fn multi_column_partitioning_nests_directories() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path());

    for format in [FileFormat::Parquet, FileFormat::Csv, FileFormat::Feather] {
        let location = TableLocation::Dataset {
            directory: format!("orders_{}", format),
            partitioning: vec!["region".to_string(), "year".to_string()],
        };
        storage.write_table(&location, format, &orders()).await.unwrap();
        assert!(temp
            .path()
            .join(format!("orders_{}/region=eu/year=2024", format))
            .is_dir());

        let read = storage.read_table(&location, format).await.unwrap();
        assert_eq!(read.num_rows(), 4, "{}", format);
        assert_eq!(
            read.schema.field_with_name("year").unwrap().data_type(),
            &DataType::Utf8
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unpartitioned_dataset_writes_into_directory() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path());
    let location = TableLocation::Dataset {
        directory: "flat".to_string(),
        partitioning: vec![],
    };

    storage
        .write_table(&location, FileFormat::Csv, &orders())
        .await
        .unwrap();
    let read = storage.read_table(&location, FileFormat::Csv).await.unwrap();
    assert_eq!(read.num_rows(), 4);
    assert_eq!(read.schema.fields().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn feather_file_with_other_extension_is_readable() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path());
    let location = TableLocation::File("orders.feather".to_string());

    storage
        .write_table(&location, FileFormat::Feather, &orders())
        .await
        .unwrap();
    let read = storage
        .read_table(&location, "ipc".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(read.num_rows(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn writes_outside_base_dir_are_rejected() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path().join("base"));

    let err = storage
        .write_table(
            &TableLocation::File("../escape.csv".to_string()),
            FileFormat::Csv,
            &orders(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath { .. }));
    assert!(!temp.path().join("escape.csv").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn partition_columns_need_not_be_plain_identifiers() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path());
    let schema = Arc::new(Schema::new(vec![
        Field::new("user-id", DataType::Int64, true),
        Field::new("order date", DataType::Utf8, true),
        Field::new("amount", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 2])),
            Arc::new(StringArray::from(vec!["2024-01-01", "2024-01-02", "2024-01-01"])),
            Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])),
        ],
    )
    .unwrap();
    let data = FetchedTable::new(schema, vec![batch]);

    for format in [FileFormat::Parquet, FileFormat::Csv, FileFormat::Feather] {
        let location = TableLocation::Dataset {
            directory: format!("by_user_{}", format),
            partitioning: vec!["user-id".to_string()],
        };
        storage.write_table(&location, format, &data).await.unwrap();
        assert!(temp
            .path()
            .join(format!("by_user_{}/user-id=2", format))
            .is_dir());

        let read = storage.read_table(&location, format).await.unwrap();
        assert_eq!(read.num_rows(), 3, "{}", format);

        let spaced = TableLocation::Dataset {
            directory: format!("by_date_{}", format),
            partitioning: vec!["order date".to_string()],
        };
        storage.write_table(&spaced, format, &data).await.unwrap();
    }
}
