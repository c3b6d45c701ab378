use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::axis_positions;
use crate::data::dataset::{CompiledDataset, VariableData, TIME_DIM};
use crate::data::model::{CellValue, FieldKind};

/// Schema metadata key: JSON list of dim names in axis order.
pub const METADATA_DIMS: &str = "dataset:dims";
/// Schema metadata key: JSON list of axis lengths.
pub const METADATA_SHAPE: &str = "dataset:shape";
/// Schema metadata key: JSON object, coordinate name → dimension name.
pub const METADATA_COORDINATES: &str = "dataset:coordinates";
/// Schema metadata key: JSON object, variable name → dtype.
pub const METADATA_VARIABLES: &str = "dataset:variables";

/// Write the dataset as a single Parquet row group.
///
/// Layout (one row per cell of the `dims` product, row-major):
/// - `time`: Timestamp(ms, UTC)
/// - one column per dimension, typed like the dimension field
/// - one nullable column per coordinate, repeated along its dimension
/// - one `Int64` / `Float64` column per variable
pub fn write_parquet(path: &Path, dataset: &CompiledDataset) -> Result<()> {
    let shape = dataset.shape();
    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();

    let millis: Vec<i64> = axis_positions(&shape, 0)
        .map(|t| dataset.time()[t].timestamp_millis())
        .collect();
    fields.push(Field::new(
        TIME_DIM,
        DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
        false,
    ));
    columns.push(Arc::new(
        TimestampMillisecondArray::from(millis).with_timezone("UTC"),
    ));

    for (i, dim) in dataset.dimensions().iter().enumerate() {
        let cells = axis_positions(&shape, i + 1).map(|p| Some(&dim.values[p]));
        fields.push(Field::new(&dim.name, arrow_type(dim.kind), false));
        columns.push(cell_column(dim.kind, cells));
    }

    for (name, coord) in dataset.coordinates() {
        let axis = dataset
            .dims()
            .iter()
            .position(|d| *d == coord.dimension)
            .with_context(|| {
                format!(
                    "coordinate '{name}' refers to missing dim '{}'",
                    coord.dimension
                )
            })?;
        let cells = axis_positions(&shape, axis).map(|p| coord.values[p].as_ref());
        fields.push(Field::new(name, arrow_type(coord.kind), true));
        columns.push(cell_column(coord.kind, cells));
    }

    for (name, data) in dataset.variables() {
        let column: ArrayRef = match data {
            VariableData::Integer(a) => Arc::new(Int64Array::from_iter_values(a.iter().copied())),
            VariableData::Float(a) => Arc::new(Float64Array::from_iter_values(a.iter().copied())),
        };
        fields.push(Field::new(name, arrow_type(data.kind()), false));
        columns.push(column);
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, layout_metadata(dataset)?));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn arrow_type(kind: FieldKind) -> DataType {
    match kind {
        FieldKind::Integer => DataType::Int64,
        FieldKind::Float => DataType::Float64,
        FieldKind::String => DataType::Utf8,
    }
}

/// Build an Arrow column of `kind` from cell values; mismatched or missing
/// cells become nulls.
fn cell_column<'a>(
    kind: FieldKind,
    cells: impl Iterator<Item = Option<&'a CellValue>>,
) -> ArrayRef {
    match kind {
        FieldKind::Integer => Arc::new(Int64Array::from(
            cells.map(|c| c.and_then(CellValue::as_i64)).collect::<Vec<_>>(),
        )),
        FieldKind::Float => Arc::new(Float64Array::from(
            cells.map(|c| c.and_then(CellValue::as_f64)).collect::<Vec<_>>(),
        )),
        FieldKind::String => Arc::new(StringArray::from(
            cells.map(|c| c.and_then(CellValue::as_str)).collect::<Vec<_>>(),
        )),
    }
}

fn layout_metadata(dataset: &CompiledDataset) -> Result<HashMap<String, String>> {
    let coordinates: BTreeMap<&str, &str> = dataset
        .coordinates()
        .iter()
        .map(|(name, c)| (name.as_str(), c.dimension.as_str()))
        .collect();
    let variables: BTreeMap<&str, String> = dataset
        .variables()
        .iter()
        .map(|(name, v)| (name.as_str(), v.kind().to_string()))
        .collect();

    Ok(HashMap::from([
        (METADATA_DIMS.to_string(), serde_json::to_string(&dataset.dims())?),
        (METADATA_SHAPE.to_string(), serde_json::to_string(&dataset.shape())?),
        (METADATA_COORDINATES.to_string(), serde_json::to_string(&coordinates)?),
        (METADATA_VARIABLES.to_string(), serde_json::to_string(&variables)?),
    ]))
}
