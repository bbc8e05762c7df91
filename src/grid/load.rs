//! Loading the grid dataset: a CSV of `index,latitude,longitude` rows (optionally gzipped)
//! read from disk or downloaded, then cached as bincode so later clients skip parsing.

use crate::grid::error::LocateError;
use crate::types::dataset::Dataset;
use crate::types::grid_point::GridPoint;
use crate::utils::csv_bytes_to_frame;
use async_compression::tokio::bufread::GzipDecoder;
use bincode::config::{Configuration, Fixint, LittleEndian};
use futures_util::TryStreamExt;
use log::{info, warn};
use polars::prelude::*;
use reqwest::Client;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

const ID_COLUMN: &str = "index";
const LATITUDE_COLUMN: &str = "latitude";
const LONGITUDE_COLUMN: &str = "longitude";

/// Where the grid dataset CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridSource {
    Path(PathBuf),
    Url(String),
}

impl GridSource {
    fn is_gzipped(&self) -> bool {
        match self {
            GridSource::Path(path) => path.extension().is_some_and(|ext| ext == "gz"),
            GridSource::Url(url) => url.ends_with(".gz"),
        }
    }
}

impl From<&str> for GridSource {
    fn from(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            GridSource::Url(value.to_string())
        } else {
            GridSource::Path(PathBuf::from(value))
        }
    }
}

/// Loads the grid points for `dataset`, preferring the bincode cache in `cache_dir`.
///
/// The cache is keyed by dataset only. Delete `<dataset>_grid_points.bin` after changing
/// the source.
pub async fn load_grid_points(
    source: &GridSource,
    dataset: Dataset,
    cache_dir: &Path,
) -> Result<Vec<GridPoint>, LocateError> {
    let cache_file = cache_dir.join(dataset.grid_cache_file_name());

    if tokio::fs::metadata(&cache_file).await.is_ok() {
        info!("Loading {dataset} grid points from cache {}", cache_file.display());
        let path = cache_file.clone();
        return tokio::task::spawn_blocking(move || read_cached_points(&path)).await?;
    }

    warn!("Grid cache miss for {dataset}, reading {source:?}");
    let bytes = read_source(source).await?;
    let points = tokio::task::spawn_blocking(move || {
        let df = csv_bytes_to_frame(&bytes, &[ID_COLUMN])?;
        frame_to_grid_points(&df)
    })
    .await??;
    info!("Parsed {} {dataset} grid points", points.len());

    write_cached_points(points.clone(), &cache_file).await?;
    Ok(points)
}

async fn read_source(source: &GridSource) -> Result<Vec<u8>, LocateError> {
    let raw = match source {
        GridSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| LocateError::SourceRead(path.clone(), e))?,
        GridSource::Url(url) => download(url).await?,
    };
    if !source.is_gzipped() {
        return Ok(raw);
    }
    let mut decoder = GzipDecoder::new(BufReader::new(raw.as_slice()));
    let mut decompressed = Vec::with_capacity(raw.len() * 4);
    decoder.read_to_end(&mut decompressed).await?;
    Ok(decompressed)
}

async fn download(url: &str) -> Result<Vec<u8>, LocateError> {
    let response = Client::new()
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|source| LocateError::Download {
            url: url.to_string(),
            status: source.status(),
            source,
        })?;
    let stream = response.bytes_stream().map_err(io::Error::other);
    let mut reader = StreamReader::new(stream);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

/// Converts a parsed grid CSV into points. Latitude and longitude may be integer typed.
pub(crate) fn frame_to_grid_points(df: &DataFrame) -> Result<Vec<GridPoint>, LocateError> {
    let column = |name: &'static str| {
        df.column(name)
            .map_err(|_| LocateError::MissingColumn(name))
    };
    let ids = column(ID_COLUMN)?.cast(&DataType::String)?;
    let latitudes = column(LATITUDE_COLUMN)?.cast(&DataType::Float64)?;
    let longitudes = column(LONGITUDE_COLUMN)?.cast(&DataType::Float64)?;

    let ids = ids.str()?;
    let latitudes = latitudes.f64()?;
    let longitudes = longitudes.f64()?;

    ids.into_iter()
        .zip(latitudes)
        .zip(longitudes)
        .enumerate()
        .map(|(row, ((id, latitude), longitude))| {
            let missing = |column| LocateError::MissingValue { row, column };
            Ok(GridPoint::new(
                id.ok_or_else(|| missing(ID_COLUMN))?,
                latitude.ok_or_else(|| missing(LATITUDE_COLUMN))?,
                longitude.ok_or_else(|| missing(LONGITUDE_COLUMN))?,
            ))
        })
        .collect()
}

fn read_cached_points(cache_path: &Path) -> Result<Vec<GridPoint>, LocateError> {
    let bytes = std::fs::read(cache_path)
        .map_err(|e| LocateError::CacheRead(cache_path.to_path_buf(), e))?;
    let (points, _) = bincode::serde::decode_from_slice::<Vec<GridPoint>, _>(&bytes, BINCODE_CONFIG)
        .map_err(|e| LocateError::CacheDecode(cache_path.to_path_buf(), Box::new(e)))?;
    Ok(points)
}

async fn write_cached_points(points: Vec<GridPoint>, cache_path: &Path) -> Result<(), LocateError> {
    let encoded = tokio::task::spawn_blocking(move || {
        bincode::serde::encode_to_vec(points, BINCODE_CONFIG)
            .map_err(|e| LocateError::CacheEncode(Box::new(e)))
    })
    .await??;
    tokio::fs::write(cache_path, &encoded)
        .await
        .map_err(|e| LocateError::CacheWrite(cache_path.to_path_buf(), e))?;
    info!(
        "Wrote grid cache ({} bytes) to {}",
        encoded.len(),
        cache_path.display()
    );
    Ok(())
}
