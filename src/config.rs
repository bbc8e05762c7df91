//! Deployment settings for a [`WindClient`](crate::WindClient), read from a JSON file.
//!
//! The keys match the deployment files already in use:
//!
//! ```json
//! {
//!   "region_name": "us-west-2",
//!   "database": "windwatts",
//!   "output_location": "s3://windwatts-results/athena/",
//!   "athena_table_name": "wtk_all",
//!   "alt_athena_table_name": "wtk_all_by_index",
//!   "athena_workgroup": "primary"
//! }
//! ```

use crate::error::WindDataError;
use crate::grid::load::GridSource;
use crate::query::engine::ExecutionContext;
use crate::query::result_store::split_s3_url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Results of identical statements younger than this are reused by the engine.
pub const DEFAULT_RESULT_REUSE_MINUTES: u32 = 10080;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindDataConfig {
    #[serde(default)]
    pub region_name: Option<String>,
    /// Bucket holding the dataset itself. Informational; queries go through the engine.
    #[serde(default)]
    pub bucket_name: Option<String>,
    pub database: String,
    /// `s3://bucket/prefix/` the engine writes results to.
    pub output_location: String,
    /// Bucket results are read from. Derived from `output_location` when absent.
    #[serde(default)]
    pub output_bucket: Option<String>,
    /// Table partitioned by location, used for location-scoped queries.
    pub athena_table_name: String,
    /// Table used for location-agnostic queries. Falls back to `athena_table_name`.
    #[serde(default)]
    pub alt_athena_table_name: Option<String>,
    #[serde(default)]
    pub athena_workgroup: Option<String>,
    /// Path or URL of the grid-point dataset (`index,latitude,longitude` CSV).
    #[serde(default)]
    pub location_data: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_result_reuse_minutes")]
    pub result_reuse_minutes: u32,
}

fn default_result_reuse_minutes() -> u32 {
    DEFAULT_RESULT_REUSE_MINUTES
}

impl WindDataConfig {
    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// [`WindDataError::ConfigRead`] if the file cannot be read and
    /// [`WindDataError::ConfigParse`] if it is not a valid config.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WindDataError> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| WindDataError::ConfigRead(path.to_path_buf(), e))?;
        serde_json::from_slice(&contents)
            .map_err(|e| WindDataError::ConfigParse(path.to_path_buf(), e))
    }

    /// Table for location-agnostic queries.
    pub fn alt_table(&self) -> &str {
        self.alt_athena_table_name
            .as_deref()
            .unwrap_or(&self.athena_table_name)
    }

    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            database: self.database.clone(),
            output_location: self.output_location.clone(),
            workgroup: self.athena_workgroup.clone(),
            reuse_max_age_minutes: Some(self.result_reuse_minutes),
        }
    }

    /// The bucket query results land in.
    pub fn result_bucket(&self) -> Result<String, WindDataError> {
        match &self.output_bucket {
            Some(bucket) => Ok(bucket.clone()),
            None => split_s3_url(&self.output_location)
                .map(|(bucket, _)| bucket.to_string())
                .map_err(|e| WindDataError::InvalidInput(e.to_string())),
        }
    }

    pub fn grid_source(&self) -> Option<GridSource> {
        self.location_data.as_deref().map(GridSource::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "database": "windwatts",
        "output_location": "s3://windwatts-results/athena/",
        "athena_table_name": "wtk_all"
    }"#;

    fn write_config(contents: &str) -> std::io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    #[tokio::test]
    async fn minimal_config_gets_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config(MINIMAL)?;
        let config = WindDataConfig::from_file(file.path()).await?;
        assert_eq!(config.result_reuse_minutes, DEFAULT_RESULT_REUSE_MINUTES);
        assert_eq!(config.alt_table(), "wtk_all");
        assert_eq!(config.result_bucket()?, "windwatts-results");
        assert!(config.grid_source().is_none());

        let context = config.execution_context();
        assert_eq!(context.database, "windwatts");
        assert_eq!(context.reuse_max_age_minutes, Some(10080));
        Ok(())
    }

    #[tokio::test]
    async fn full_config() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config(
            r#"{
                "region_name": "us-west-2",
                "bucket_name": "wtk-data",
                "database": "windwatts",
                "output_location": "s3://windwatts-results/athena/",
                "output_bucket": "other-results",
                "athena_table_name": "wtk_all",
                "alt_athena_table_name": "wtk_all_by_index",
                "athena_workgroup": "primary",
                "location_data": "https://example.org/wtk_locations.csv.gz",
                "result_reuse_minutes": 60
            }"#,
        )?;
        let config = WindDataConfig::from_file(file.path()).await?;
        assert_eq!(config.alt_table(), "wtk_all_by_index");
        assert_eq!(config.result_bucket()?, "other-results");
        assert_eq!(config.execution_context().workgroup.as_deref(), Some("primary"));
        assert!(matches!(config.grid_source(), Some(GridSource::Url(_))));
        assert_eq!(config.result_reuse_minutes, 60);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = WindDataConfig::from_file("/definitely/not/here.json")
            .await
            .unwrap_err();
        assert!(matches!(err, WindDataError::ConfigRead(..)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn missing_key_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config(r#"{"database": "windwatts"}"#)?;
        let err = WindDataConfig::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, WindDataError::ConfigParse(..)));
        Ok(())
    }
}
