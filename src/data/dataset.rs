use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use ndarray::ArrayD;

use super::model::{CellValue, FieldKind};

/// Name of the axis built from snapshot timestamps.
pub const TIME_DIM: &str = "time";

// ---------------------------------------------------------------------------
// Axes and coordinate projections
// ---------------------------------------------------------------------------

/// A declared dimension: its sorted, deduplicated values.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub kind: FieldKind,
    pub values: Vec<CellValue>,
}

impl Dimension {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of `value` on this axis.
    pub fn position(&self, value: &CellValue) -> Option<usize> {
        self.values.binary_search(value).ok()
    }
}

/// A coordinate field projected onto the axis of the dimension it describes.
/// `values[i]` belongs to `dimension.values[i]`; `None` when every record
/// with that dimension value lacks the field.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dimension: String,
    pub kind: FieldKind,
    pub values: Vec<Option<CellValue>>,
}

// ---------------------------------------------------------------------------
// Data variables
// ---------------------------------------------------------------------------

/// Dense values of one numeric field over `(time, dim_1, …, dim_n)`.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Integer(ArrayD<i64>),
    Float(ArrayD<f64>),
}

impl VariableData {
    pub fn shape(&self) -> &[usize] {
        match self {
            VariableData::Integer(a) => a.shape(),
            VariableData::Float(a) => a.shape(),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            VariableData::Integer(_) => FieldKind::Integer,
            VariableData::Float(_) => FieldKind::Float,
        }
    }

    /// Value at a full index tuple, as a [`CellValue`].
    pub fn get(&self, index: &[usize]) -> Option<CellValue> {
        match self {
            VariableData::Integer(a) => a.get(index).map(|v| CellValue::Integer(*v)),
            VariableData::Float(a) => a.get(index).map(|v| CellValue::Float(*v)),
        }
    }

    /// Every value in row-major order.
    pub fn iter_values(&self) -> Box<dyn Iterator<Item = CellValue> + '_> {
        match self {
            VariableData::Integer(a) => Box::new(a.iter().map(|v| CellValue::Integer(*v))),
            VariableData::Float(a) => Box::new(a.iter().map(|v| CellValue::Float(*v))),
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledDataset – the compilation result
// ---------------------------------------------------------------------------

/// Labeled multi-dimensional arrays compiled from a snapshot directory.
///
/// Every variable shares the shape `(time, dimensions[0], …)`. Instances are
/// only produced by [`crate::data::builder::build_dataset`] and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDataset {
    pub(crate) time: Vec<DateTime<Utc>>,
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) coordinates: BTreeMap<String, Coordinate>,
    pub(crate) variables: BTreeMap<String, VariableData>,
}

impl CompiledDataset {
    pub fn time(&self) -> &[DateTime<Utc>] {
        &self.time
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn coordinates(&self) -> &BTreeMap<String, Coordinate> {
        &self.coordinates
    }

    pub fn variables(&self) -> &BTreeMap<String, VariableData> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableData> {
        self.variables.get(name)
    }

    /// Dim names in array axis order, `time` first.
    pub fn dims(&self) -> Vec<&str> {
        std::iter::once(TIME_DIM)
            .chain(self.dimensions.iter().map(|d| d.name.as_str()))
            .collect()
    }

    /// Length of each dim, in [`Self::dims`] order.
    pub fn shape(&self) -> Vec<usize> {
        std::iter::once(self.time.len())
            .chain(self.dimensions.iter().map(Dimension::len))
            .collect()
    }

    /// Display labels of one dim's axis values (time as RFC 3339).
    pub fn axis_labels(&self, dim: &str) -> Option<Vec<String>> {
        if dim == TIME_DIM {
            return Some(self.time.iter().map(|t| t.to_rfc3339()).collect());
        }
        self.dimension(dim)
            .map(|d| d.values.iter().map(ToString::to_string).collect())
    }
}

const PREVIEW_LEN: usize = 5;

fn preview<T: fmt::Display>(values: impl ExactSizeIterator<Item = T>) -> String {
    let total = values.len();
    let mut out: Vec<String> = values.take(PREVIEW_LEN).map(|v| v.to_string()).collect();
    if total > PREVIEW_LEN {
        out.push(format!("... ({total} total)"));
    }
    out.join(" ")
}

impl fmt::Display for CompiledDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<String> = self
            .dims()
            .iter()
            .zip(self.shape())
            .map(|(name, len)| format!("{name}: {len}"))
            .collect();
        writeln!(f, "<CompiledDataset>")?;
        writeln!(f, "Dimensions:  ({})", sizes.join(", "))?;

        writeln!(f, "Coordinates:")?;
        writeln!(
            f,
            "  * {TIME_DIM:<16} ({TIME_DIM}) datetime {}",
            preview(self.time.iter().map(|t| t.to_rfc3339()))
        )?;
        for dim in &self.dimensions {
            writeln!(
                f,
                "  * {:<16} ({}) {} {}",
                dim.name,
                dim.name,
                dim.kind,
                preview(dim.values.iter())
            )?;
        }
        for (name, coord) in &self.coordinates {
            let labels = coord.values.iter().map(|v| match v {
                Some(v) => v.to_string(),
                None => "<none>".to_string(),
            });
            writeln!(
                f,
                "    {name:<16} ({}) {} {}",
                coord.dimension,
                coord.kind,
                preview(labels)
            )?;
        }

        writeln!(f, "Data variables:")?;
        let dims = self.dims().join(", ");
        for (name, data) in &self.variables {
            writeln!(f, "    {name:<16} ({dims}) {}", data.kind())?;
        }
        Ok(())
    }
}
