use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, Axis};

use super::dataset::{CompiledDataset, VariableData};
use super::model::CellValue;
use crate::error::{CompileError, Result};

// ---------------------------------------------------------------------------
// Selectors: which label is picked per dim
// ---------------------------------------------------------------------------

/// Per-dim label selection: dim name → axis label.
/// Dims absent from the map are kept whole.
pub type Selectors = BTreeMap<String, String>;

/// Parse a `dim=label` selector.
pub fn parse_selector(text: &str) -> Result<(String, String)> {
    let (dim, label) = text
        .split_once('=')
        .ok_or_else(|| CompileError::Selection(format!("expected DIM=LABEL, got '{text}'")))?;
    if dim.trim().is_empty() {
        return Err(CompileError::Selection(format!(
            "expected DIM=LABEL, got '{text}'"
        )));
    }
    Ok((dim.trim().to_string(), label.trim().to_string()))
}

/// The values of one variable left after fixing some dims to one label each.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub variable: String,
    /// Dims that were not fixed, in axis order.
    pub dims: Vec<String>,
    /// Axis labels of each remaining dim.
    pub labels: Vec<Vec<String>>,
    /// Remaining values in row-major order.
    pub values: Vec<CellValue>,
}

impl Selection {
    /// Each value paired with the labels addressing it.
    pub fn entries(&self) -> Vec<(Vec<&str>, &CellValue)> {
        let shape: Vec<usize> = self.labels.iter().map(Vec::len).collect();
        self.values
            .iter()
            .enumerate()
            .map(|(flat, value)| {
                let mut rest = flat;
                let mut addr = vec![""; shape.len()];
                for (axis, len) in shape.iter().enumerate().rev() {
                    addr[axis] = self.labels[axis][rest % len].as_str();
                    rest /= len;
                }
                (addr, value)
            })
            .collect()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.is_empty() {
            return match self.values.first() {
                Some(v) => writeln!(f, "{} = {v}", self.variable),
                None => writeln!(f, "{} is empty", self.variable),
            };
        }
        writeln!(f, "{} ({})", self.variable, self.dims.join(", "))?;
        for (addr, value) in self.entries() {
            writeln!(f, "  {} = {value}", addr.join(", "))?;
        }
        Ok(())
    }
}

/// Select the values of `variable` at the labels given in `selectors`.
pub fn select(
    dataset: &CompiledDataset,
    variable: &str,
    selectors: &Selectors,
) -> Result<Selection> {
    let data = dataset
        .variable(variable)
        .ok_or_else(|| CompileError::Selection(format!("unknown variable '{variable}'")))?;
    let dims = dataset.dims();

    if let Some(unknown) = selectors.keys().find(|k| !dims.contains(&k.as_str())) {
        return Err(CompileError::Selection(format!(
            "'{variable}' has no dimension '{unknown}'"
        )));
    }

    let mut fixed = Vec::with_capacity(dims.len());
    let mut kept_dims = Vec::new();
    let mut kept_labels = Vec::new();
    for dim in &dims {
        let labels = dataset
            .axis_labels(dim)
            .ok_or_else(|| CompileError::Selection(format!("unknown dimension '{dim}'")))?;
        match selectors.get(*dim) {
            Some(label) => {
                let pos = labels.iter().position(|l| l == label).ok_or_else(|| {
                    CompileError::Selection(format!("'{label}' is not a value of '{dim}'"))
                })?;
                fixed.push(Some(pos));
            }
            None => {
                fixed.push(None);
                kept_dims.push(dim.to_string());
                kept_labels.push(labels);
            }
        }
    }

    let values = match data {
        VariableData::Integer(array) => slice_values(array, &fixed, CellValue::Integer),
        VariableData::Float(array) => slice_values(array, &fixed, CellValue::Float),
    };

    Ok(Selection {
        variable: variable.to_string(),
        dims: kept_dims,
        labels: kept_labels,
        values,
    })
}

fn slice_values<T: Copy>(
    array: &ArrayD<T>,
    fixed: &[Option<usize>],
    wrap: fn(T) -> CellValue,
) -> Vec<CellValue> {
    let mut view = array.view();
    // Highest axis first so lower axis numbers stay valid.
    for (axis, pos) in fixed.iter().enumerate().rev() {
        if let Some(pos) = pos {
            view = view.index_axis_move(Axis(axis), *pos);
        }
    }
    view.iter().map(|v| wrap(*v)).collect()
}
