use log::info;
use polars::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const CACHE_DIR_NAME: &str = "windwatts_rs_cache";

pub fn get_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            )
        })
        .map(|p| p.join(CACHE_DIR_NAME))
}

pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Cache path exists but is not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

/// Parses CSV bytes with a header row. Every field is read as text first, then each
/// column not named in `string_columns` is narrowed to `Int64` or `Float64` when all of
/// its values parse. Query results quote every field, so inference cannot be left to the
/// reader.
///
/// Blocking; call from `spawn_blocking`.
pub(crate) fn csv_bytes_to_frame(bytes: &[u8], string_columns: &[&str]) -> PolarsResult<DataFrame> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_rechunk(true)
        .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))?
        .finish()?;

    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            if string_columns.contains(&column.name().as_str()) {
                column.clone()
            } else {
                narrow_text_column(column)
            }
        })
        .collect::<Vec<_>>();
    DataFrame::new(columns)
}

fn narrow_text_column(column: &Column) -> Column {
    for dtype in [DataType::Int64, DataType::Float64] {
        if let Ok(narrowed) = column.strict_cast(&dtype) {
            return narrowed;
        }
    }
    column.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_stays_textual() -> PolarsResult<()> {
        let csv = b"index,windspeed_80m\n\"007\",\"5.5\"\n\"12\",\n";
        let df = csv_bytes_to_frame(csv, &["index"])?;
        let index = df.column("index")?.str()?;
        assert_eq!(index.get(0), Some("007"));
        assert_eq!(index.get(1), Some("12"));
        let speed = df.column("windspeed_80m")?.f64()?;
        assert_eq!(speed.get(0), Some(5.5));
        assert_eq!(speed.get(1), None);
        Ok(())
    }

    #[test]
    fn narrows_numbers_and_keeps_text() -> PolarsResult<()> {
        let csv = b"year,mohr,varset,windspeed_80m\n2001,101,all,4\n2002,1224,all,6.25\n";
        let df = csv_bytes_to_frame(csv, &[])?;
        assert_eq!(df.column("year")?.dtype(), &DataType::Int64);
        assert_eq!(df.column("mohr")?.i64()?.get(1), Some(1224));
        assert_eq!(df.column("varset")?.dtype(), &DataType::String);
        assert_eq!(df.column("windspeed_80m")?.f64()?.get(1), Some(6.25));
        Ok(())
    }

    #[tokio::test]
    async fn creates_missing_cache_dir() -> io::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("nested").join("cache");
        ensure_cache_dir_exists(&dir).await?;
        assert!(dir.is_dir());
        ensure_cache_dir_exists(&dir).await?;
        Ok(())
    }

    #[tokio::test]
    async fn rejects_file_as_cache_dir() -> io::Result<()> {
        let file = NamedTempFile::new()?;
        assert!(ensure_cache_dir_exists(file.path()).await.is_err());
        Ok(())
    }
}
