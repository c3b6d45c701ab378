//! Compile a directory of timestamped CSV snapshots into labeled
//! multi-dimensional arrays keyed by time and declared dimension fields.

pub mod config;
pub mod data;
pub mod error;
pub mod output;
pub mod shell;

use std::path::Path;

use log::info;

pub use config::{CompileOptions, CoordinateDecl};
pub use data::dataset::CompiledDataset;
pub use error::{CompileError, ErrorCategory};

/// Load, infer and build in one call.
pub fn compile_directory(path: &Path, options: &CompileOptions) -> error::Result<CompiledDataset> {
    let raw = data::loader::load_directory(path)?;
    info!(
        "loaded {} snapshots ({} rows, {} fields)",
        raw.snapshots.len(),
        raw.record_count(),
        raw.field_names.len()
    );
    let typed = data::infer::infer_types(raw)?;
    info!(
        "classified fields: {} integer, {} float, {} string",
        typed.classification.integer_fields().len(),
        typed.classification.float_fields().len(),
        typed.classification.string_fields().len()
    );
    data::builder::build_dataset(&typed, options)
}
