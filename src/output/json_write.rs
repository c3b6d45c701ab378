use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::data::dataset::{CompiledDataset, TIME_DIM};
use crate::data::model::{CellValue, FieldKind};

#[derive(Serialize)]
struct DatasetDocument<'a> {
    dims: Vec<&'a str>,
    shape: Vec<usize>,
    /// Axis values per dim; `time` as RFC 3339 strings.
    coords: BTreeMap<&'a str, JsonValue>,
    coordinates: BTreeMap<&'a str, CoordinateDocument<'a>>,
    data_vars: BTreeMap<&'a str, VariableDocument<'a>>,
}

#[derive(Serialize)]
struct CoordinateDocument<'a> {
    dim: &'a str,
    dtype: FieldKind,
    values: &'a [Option<CellValue>],
}

#[derive(Serialize)]
struct VariableDocument<'a> {
    dims: Vec<&'a str>,
    dtype: FieldKind,
    /// Row-major; NaN is written as `null`.
    data: Vec<CellValue>,
}

/// Serialize the dataset as one pretty-printed JSON document.
pub fn write_json(path: &Path, dataset: &CompiledDataset) -> Result<()> {
    let document = document(dataset)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &document).context("serializing dataset")?;
    out.flush().context("flushing JSON output")?;
    Ok(())
}

fn document(dataset: &CompiledDataset) -> Result<DatasetDocument<'_>> {
    let dims = dataset.dims();

    let mut coords = BTreeMap::new();
    let times: Vec<String> = dataset.time().iter().map(|t| t.to_rfc3339()).collect();
    coords.insert(TIME_DIM, serde_json::to_value(times)?);
    for dim in dataset.dimensions() {
        coords.insert(dim.name.as_str(), serde_json::to_value(&dim.values)?);
    }

    let coordinates = dataset
        .coordinates()
        .iter()
        .map(|(name, c)| {
            let doc = CoordinateDocument {
                dim: c.dimension.as_str(),
                dtype: c.kind,
                values: &c.values,
            };
            (name.as_str(), doc)
        })
        .collect();

    let data_vars = dataset
        .variables()
        .iter()
        .map(|(name, data)| {
            let doc = VariableDocument {
                dims: dims.clone(),
                dtype: data.kind(),
                data: data.iter_values().collect(),
            };
            (name.as_str(), doc)
        })
        .collect();

    Ok(DatasetDocument {
        shape: dataset.shape(),
        dims,
        coords,
        coordinates,
        data_vars,
    })
}
