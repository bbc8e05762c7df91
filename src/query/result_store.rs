use crate::query::error::QueryError;
use crate::utils::csv_bytes_to_frame;
use log::info;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use polars::prelude::DataFrame;
use std::sync::Arc;

/// Reads query result CSVs from the bucket the engine writes them to.
#[derive(Debug, Clone)]
pub struct ResultReader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ResultReader {
    /// `store` must be scoped to `bucket`; result locations are resolved to keys in it.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        ResultReader {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) fn object_path(&self, location: &str) -> Result<Path, QueryError> {
        let (bucket, key) = split_s3_url(location)?;
        if bucket != self.bucket {
            return Err(QueryError::ForeignBucket {
                location: location.to_string(),
                bucket: self.bucket.clone(),
            });
        }
        Ok(Path::from(key))
    }

    /// Downloads the CSV at `location` and parses it. `index` is always read as text so
    /// ids keep their leading zeros.
    pub async fn read_frame(&self, location: &str) -> Result<DataFrame, QueryError> {
        let path = self.object_path(location)?;
        let read_error = |source| QueryError::ResultRead {
            location: location.to_string(),
            source,
        };
        let bytes = self
            .store
            .get(&path)
            .await
            .map_err(read_error)?
            .bytes()
            .await
            .map_err(read_error)?;
        info!("Read {} bytes of query result from {location}", bytes.len());

        let df = tokio::task::spawn_blocking(move || csv_bytes_to_frame(&bytes, &["index"]))
            .await?
            .map_err(|source| QueryError::ResultParse {
                location: location.to_string(),
                source,
            })?;
        Ok(df)
    }
}

/// Splits `s3://bucket/key` into its bucket and key.
pub(crate) fn split_s3_url(location: &str) -> Result<(&str, &str), QueryError> {
    location
        .strip_prefix("s3://")
        .and_then(|rest| rest.split_once('/'))
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| QueryError::ResultLocation(location.to_string()))
}

/// An S3 store for `bucket`, with credentials taken from the environment.
pub fn s3_result_store(
    region: Option<&str>,
    bucket: &str,
) -> Result<Arc<dyn ObjectStore>, QueryError> {
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
    if let Some(region) = region {
        builder = builder.with_region(region);
    }
    let store = builder.build().map_err(|source| QueryError::StoreSetup {
        bucket: bucket.to_string(),
        source,
    })?;
    Ok(Arc::new(store))
}
