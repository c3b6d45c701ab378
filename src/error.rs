use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::CellValue;

/// Broad failure classes reported by a compilation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The input directory or one of its files is malformed.
    InputStructure,
    /// A field's values could not be uniformly classified.
    TypeInconsistency,
    /// A coordinate field disagrees with itself for one dimension value.
    CoordinateConflict,
    /// Dimension/coordinate declarations or lookups do not match the data.
    Declaration,
}

/// Error type for loading, inference, building and selection failures.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("input path is not a directory: {}", path.display())]
    DirectoryNotFound { path: PathBuf },
    #[error("data file {} has no paired header file {}", data.display(), headers.display())]
    MissingHeaderFile { data: PathBuf, headers: PathBuf },
    #[error("could not find Last-Modified header in {}", path.display())]
    MissingTimestamp { path: PathBuf },
    #[error("invalid Last-Modified value '{value}' in {}: {reason}", path.display())]
    InvalidTimestamp {
        path: PathBuf,
        value: String,
        reason: String,
    },
    #[error("reading {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("parsing CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("field '{field}' holds '{value}', which does not fit its inferred type")]
    TypeInconsistency { field: String, value: String },

    #[error(
        "coordinate '{coordinate}' has conflicting values for {dimension}={dimension_value}: {first} vs {second}"
    )]
    CoordinateConflict {
        coordinate: String,
        dimension: String,
        dimension_value: CellValue,
        first: String,
        second: String,
    },

    #[error("declared field '{0}' does not appear in any snapshot")]
    UnknownField(String),
    #[error("coordinate '{coordinate}' refers to undeclared dimension '{dimension}'")]
    UndeclaredDimension {
        coordinate: String,
        dimension: String,
    },
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    #[error("a record in snapshot {timestamp} has no value for dimension '{dimension}'")]
    MissingDimensionValue { dimension: String, timestamp: String },
    #[error("value {value} of dimension '{dimension}' is not on its axis")]
    DimensionValueNotOnAxis { dimension: String, value: CellValue },

    #[error("selection error: {0}")]
    Selection(String),
}

impl CompileError {
    /// Which failure class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CompileError::DirectoryNotFound { .. }
            | CompileError::MissingHeaderFile { .. }
            | CompileError::MissingTimestamp { .. }
            | CompileError::InvalidTimestamp { .. }
            | CompileError::Io { .. }
            | CompileError::Csv { .. } => ErrorCategory::InputStructure,
            CompileError::TypeInconsistency { .. } => ErrorCategory::TypeInconsistency,
            CompileError::CoordinateConflict { .. } => ErrorCategory::CoordinateConflict,
            CompileError::UnknownField(_)
            | CompileError::UndeclaredDimension { .. }
            | CompileError::InvalidDeclaration(_)
            | CompileError::MissingDimensionValue { .. }
            | CompileError::DimensionValueNotOnAxis { .. }
            | CompileError::Selection(_) => ErrorCategory::Declaration,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
