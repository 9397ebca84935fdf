use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::GVError;
use crate::record::{RawRow, Record};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

const EXTENSIONS: [&str; 3] = ["csv", "parquet", "arrow"];

fn detect_file_type(path: &Path) -> Result<FileType, GVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(GVError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, GVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GVError::FileNotFound,
        ErrorKind::PermissionDenied => GVError::PermissionDenied,
        _ => GVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(GVError::LoadingFailed(format!("{} is not a file", path.display())));
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        // keep codes like 0042 and dates as written
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

/// All values of one column rendered as strings; nulls become empty strings.
fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<String>), PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| s.trim().to_string()).unwrap_or_default())
        .collect();
    Ok((col_name.to_string(), data))
}

/// Data file of a record set: `<dir>/<dataset>.csv`, `.parquet` or `.arrow`.
pub fn find_dataset_file(dir: &Path, dataset: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{dataset}.{ext}")))
        .find(|p| p.is_file())
}

pub fn load_records<R: Record>(path: PathBuf) -> Result<Vec<R>, GVError> {
    let file_info = get_file_info(path)?;
    let start_time = Instant::now();

    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };
    let df = frame.collect()?;

    // One column per task, the rows are assembled afterwards.
    let columns: Vec<(String, Vec<String>)> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name.as_str()))
        .collect::<Result<_, _>>()?;

    let records = (0..df.height())
        .map(|idx| {
            let row: RawRow = columns
                .iter()
                .map(|(name, data)| (name.as_str(), data[idx].as_str()))
                .collect();
            R::from_row(&row).map_err(|e| {
                GVError::LoadingFailed(format!(
                    "{} row {}: {}",
                    file_info.path.display(),
                    idx + 2,
                    e
                ))
            })
        })
        .collect::<Result<Vec<R>, GVError>>()?;

    info!(
        "Loaded {} {} from {:?} ({:?}, {} bytes) in {}ms",
        records.len(),
        R::DATASET,
        file_info.path,
        file_info.file_type,
        file_info.file_size,
        start_time.elapsed().as_millis()
    );
    debug!("Columns: {:?}", columns.iter().map(|(n, _)| n).collect::<Vec<_>>());
    Ok(records)
}

/// Records of `R` from `dir`, or an empty set when the directory has no file for it.
pub fn load_dataset<R: Record>(dir: &Path) -> Result<Vec<R>, GVError> {
    match find_dataset_file(dir, R::DATASET) {
        Some(path) => load_records(path),
        None => {
            info!("No data file for {} in {:?}", R::DATASET, dir);
            Ok(Vec::new())
        }
    }
}
