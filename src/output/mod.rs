//! Persist a [`CompiledDataset`] to disk.

mod json_write;
mod parquet_write;

use std::path::Path;

use anyhow::{bail, Result};
use log::info;

use crate::data::dataset::CompiledDataset;

pub use self::json_write::write_json;
pub use self::parquet_write::{
    write_parquet, METADATA_COORDINATES, METADATA_DIMS, METADATA_SHAPE, METADATA_VARIABLES,
};

/// Write a compiled dataset.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per cell, layout described in the schema metadata
/// * `.json`    – `{ dims, shape, coords, coordinates, data_vars }`
pub fn write_dataset(path: &Path, dataset: &CompiledDataset) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(path, dataset)?,
        "json" => write_json(path, dataset)?,
        other => bail!("Unsupported output extension: .{other}"),
    }
    info!("wrote {}", path.display());
    Ok(())
}

/// Axis index of every cell along `axis`, in row-major order.
pub(crate) fn axis_positions(shape: &[usize], axis: usize) -> impl Iterator<Item = usize> {
    let total: usize = shape.iter().product();
    let stride: usize = shape[axis + 1..].iter().product();
    let len = shape[axis];
    (0..total).map(move |row| (row / stride) % len)
}
