use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, info};
use ndarray::{ArrayD, IxDyn};

use super::dataset::{CompiledDataset, Coordinate, Dimension, VariableData, TIME_DIM};
use super::model::{CellValue, FieldKind, TypedCorpus, TypedRecord};
use crate::config::{CompileOptions, CoordinateDecl};
use crate::error::{CompileError, Result};

/// Build the labeled arrays for `corpus` along `time` and the declared
/// dimensions.
///
/// Pass one builds the axes and coordinate projections, pass two writes every
/// record's numeric fields into the cell addressed by its timestamp and its
/// dimension values. Several records landing on one cell keep the last write.
pub fn build_dataset(corpus: &TypedCorpus, options: &CompileOptions) -> Result<CompiledDataset> {
    let dimension_names = declared_dimensions(corpus, options)?;
    let coordinate_decls = declared_coordinates(corpus, options, &dimension_names)?;

    let time: Vec<DateTime<Utc>> = corpus.snapshots.keys().copied().collect();
    let dimensions = dimension_names
        .iter()
        .map(|name| build_axis(corpus, name))
        .collect::<Result<Vec<_>>>()?;

    let mut coordinates = BTreeMap::new();
    for decl in coordinate_decls {
        let axis = dimensions
            .iter()
            .find(|d| d.name == decl.dimension)
            .ok_or_else(|| CompileError::UndeclaredDimension {
                coordinate: decl.coordinate.clone(),
                dimension: decl.dimension.clone(),
            })?;
        let projection = project_coordinate(corpus, decl, axis)?;
        coordinates.insert(decl.coordinate.clone(), projection);
    }

    let shape: Vec<usize> = std::iter::once(time.len())
        .chain(dimensions.iter().map(Dimension::len))
        .collect();
    let mut variables = allocate_variables(corpus, options, &shape)?;
    populate(corpus, &dimensions, &mut variables)?;

    info!(
        "built dataset: shape {:?}, {} dimensions, {} coordinates, {} variables",
        shape,
        dimensions.len() + 1,
        coordinates.len(),
        variables.len()
    );

    Ok(CompiledDataset {
        time,
        dimensions,
        coordinates,
        variables,
    })
}

// ---------------------------------------------------------------------------
// Declaration checks
// ---------------------------------------------------------------------------

fn declared_dimensions(corpus: &TypedCorpus, options: &CompileOptions) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for name in &options.dimensions {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if name == TIME_DIM {
            return Err(CompileError::InvalidDeclaration(format!(
                "'{TIME_DIM}' is reserved for the snapshot axis"
            )));
        }
        if !corpus.field_names.contains(name) {
            return Err(CompileError::UnknownField(name.clone()));
        }
        names.push(name.clone());
    }
    Ok(names)
}

fn declared_coordinates<'a>(
    corpus: &TypedCorpus,
    options: &'a CompileOptions,
    dimensions: &[String],
) -> Result<Vec<&'a CoordinateDecl>> {
    let mut by_name: BTreeMap<&str, &CoordinateDecl> = BTreeMap::new();
    for decl in &options.coordinates {
        if decl.coordinate == TIME_DIM {
            return Err(CompileError::InvalidDeclaration(format!(
                "'{TIME_DIM}' is reserved for the snapshot axis"
            )));
        }
        if !corpus.field_names.contains(&decl.coordinate) {
            return Err(CompileError::UnknownField(decl.coordinate.clone()));
        }
        if !dimensions.contains(&decl.dimension) {
            return Err(CompileError::UndeclaredDimension {
                coordinate: decl.coordinate.clone(),
                dimension: decl.dimension.clone(),
            });
        }
        if dimensions.contains(&decl.coordinate) {
            return Err(CompileError::InvalidDeclaration(format!(
                "'{}' is declared both as a dimension and as a coordinate",
                decl.coordinate
            )));
        }
        if let Some(previous) = by_name.insert(decl.coordinate.as_str(), decl) {
            if previous != decl {
                return Err(CompileError::InvalidDeclaration(format!(
                    "coordinate '{}' is declared for both '{}' and '{}'",
                    decl.coordinate, previous.dimension, decl.dimension
                )));
            }
        }
    }
    Ok(by_name.into_values().collect())
}

// ---------------------------------------------------------------------------
// Pass one – axes and coordinate projections
// ---------------------------------------------------------------------------

fn dimension_value<'a>(
    record: &'a TypedRecord,
    dimension: &str,
    timestamp: &DateTime<Utc>,
) -> Result<&'a CellValue> {
    record
        .get(dimension)
        .ok_or_else(|| CompileError::MissingDimensionValue {
            dimension: dimension.to_string(),
            timestamp: timestamp.to_rfc3339(),
        })
}

fn build_axis(corpus: &TypedCorpus, name: &str) -> Result<Dimension> {
    let mut values = BTreeSet::new();
    for (timestamp, records) in &corpus.snapshots {
        for record in records {
            values.insert(dimension_value(record, name, timestamp)?.clone());
        }
    }
    let kind = corpus
        .classification
        .kind(name)
        .unwrap_or(FieldKind::String);
    debug!("dimension '{name}' has {} values", values.len());

    Ok(Dimension {
        name: name.to_string(),
        kind,
        values: values.into_iter().collect(),
    })
}

fn describe(value: &Option<CellValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<absent>".to_string(),
    }
}

fn agrees(a: &Option<CellValue>, b: &Option<CellValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.agrees_with(b),
        (None, None) => true,
        _ => false,
    }
}

/// Project `decl.coordinate` onto `axis`. Every record sharing a dimension
/// value must carry the same coordinate value (two NaNs agree).
fn project_coordinate(
    corpus: &TypedCorpus,
    decl: &CoordinateDecl,
    axis: &Dimension,
) -> Result<Coordinate> {
    let mut projected: Vec<Option<Option<CellValue>>> = vec![None; axis.len()];

    for (timestamp, records) in &corpus.snapshots {
        for record in records {
            let dim_value = dimension_value(record, &decl.dimension, timestamp)?;
            let ix = axis
                .position(dim_value)
                .ok_or_else(|| CompileError::DimensionValueNotOnAxis {
                    dimension: decl.dimension.clone(),
                    value: dim_value.clone(),
                })?;
            let value = record.get(&decl.coordinate).cloned();

            if let Some(existing) = &projected[ix] {
                if !agrees(existing, &value) {
                    return Err(CompileError::CoordinateConflict {
                        coordinate: decl.coordinate.clone(),
                        dimension: decl.dimension.clone(),
                        dimension_value: dim_value.clone(),
                        first: describe(existing),
                        second: describe(&value),
                    });
                }
            } else {
                projected[ix] = Some(value);
            }
        }
    }

    let kind = corpus
        .classification
        .kind(&decl.coordinate)
        .unwrap_or(FieldKind::String);
    Ok(Coordinate {
        dimension: decl.dimension.clone(),
        kind,
        values: projected.into_iter().map(Option::flatten).collect(),
    })
}

// ---------------------------------------------------------------------------
// Pass two – dense arrays
// ---------------------------------------------------------------------------

/// Zero-filled arrays for integer fields, NaN-filled for float fields.
/// String fields, dimensions and coordinates get no array.
fn allocate_variables(
    corpus: &TypedCorpus,
    options: &CompileOptions,
    shape: &[usize],
) -> Result<BTreeMap<String, VariableData>> {
    let mut variables = BTreeMap::new();
    for (field, kind) in corpus.classification.iter() {
        if !kind.is_numeric() || options.is_dimension(field) || options.is_coordinate(field) {
            continue;
        }
        if field == TIME_DIM {
            return Err(CompileError::InvalidDeclaration(format!(
                "numeric field '{TIME_DIM}' collides with the snapshot axis; rename it"
            )));
        }
        let data = match kind {
            FieldKind::Integer => VariableData::Integer(ArrayD::zeros(IxDyn(shape))),
            _ => VariableData::Float(ArrayD::from_elem(IxDyn(shape), f64::NAN)),
        };
        variables.insert(field.to_string(), data);
    }
    Ok(variables)
}

fn populate(
    corpus: &TypedCorpus,
    dimensions: &[Dimension],
    variables: &mut BTreeMap<String, VariableData>,
) -> Result<()> {
    let mut index = Vec::with_capacity(dimensions.len() + 1);

    for (t, (timestamp, records)) in corpus.snapshots.iter().enumerate() {
        for record in records {
            index.clear();
            index.push(t);
            for dim in dimensions {
                let value = dimension_value(record, &dim.name, timestamp)?;
                let position =
                    dim.position(value)
                        .ok_or_else(|| CompileError::DimensionValueNotOnAxis {
                            dimension: dim.name.clone(),
                            value: value.clone(),
                        })?;
                index.push(position);
            }

            for (field, data) in variables.iter_mut() {
                write_cell(field, data, record.get(field), &index)?;
            }
        }
    }
    Ok(())
}

fn write_cell(
    field: &str,
    data: &mut VariableData,
    value: Option<&CellValue>,
    index: &[usize],
) -> Result<()> {
    match (data, value) {
        (VariableData::Integer(array), Some(CellValue::Integer(v))) => array[index] = *v,
        (VariableData::Float(array), Some(CellValue::Float(v))) => array[index] = *v,
        (_, other) => {
            return Err(CompileError::TypeInconsistency {
                field: field.to_string(),
                value: other.map(ToString::to_string).unwrap_or_default(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::infer::infer_types;
    use crate::data::model::RawCorpus;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, day, 12, 0, 0).unwrap()
    }

    fn typed(snapshots: &[(u32, &[&[(&str, &str)]])]) -> TypedCorpus {
        let mut raw = RawCorpus::default();
        for (day, rows) in snapshots {
            let mut records = Vec::new();
            for row in rows.iter() {
                let mut record = BTreeMap::new();
                for (k, v) in row.iter() {
                    raw.field_names.insert(k.to_string());
                    record.insert(k.to_string(), v.to_string());
                }
                records.push(record);
            }
            raw.snapshots.insert(ts(*day), records);
        }
        infer_types(raw).unwrap()
    }

    fn zip_options() -> CompileOptions {
        CompileOptions::default().with_dimension("zip")
    }

    #[test]
    fn single_snapshot_round_trips_values() {
        let corpus = typed(&[(
            1,
            &[
                &[("zip", "10002"), ("population", "20"), ("income", "")],
                &[("zip", "10001"), ("population", "10"), ("income", "5.5")],
            ],
        )]);

        let ds = build_dataset(&corpus, &zip_options()).unwrap();
        assert_eq!(ds.dims(), ["time", "zip"]);
        assert_eq!(ds.shape(), [1, 2]);

        let zip = ds.dimension("zip").unwrap();
        assert_eq!(zip.values, [CellValue::Integer(10001), CellValue::Integer(10002)]);

        let Some(VariableData::Integer(population)) = ds.variable("population") else {
            panic!("population should be an integer variable");
        };
        assert_eq!(population[[0, 0].as_slice()], 10);
        assert_eq!(population[[0, 1].as_slice()], 20);

        let Some(VariableData::Float(income)) = ds.variable("income") else {
            panic!("income should be a float variable");
        };
        assert_eq!(income[[0, 0].as_slice()], 5.5);
        assert!(income[[0, 1].as_slice()].is_nan());
    }

    #[test]
    fn unseen_cells_keep_fill_values() {
        let corpus = typed(&[
            (1, &[&[("zip", "1"), ("n", "7"), ("x", "0.5")]]),
            (2, &[&[("zip", "2"), ("n", "8"), ("x", "1.5")]]),
        ]);

        let ds = build_dataset(&corpus, &zip_options()).unwrap();
        let Some(VariableData::Integer(n)) = ds.variable("n") else {
            panic!("n should be an integer variable");
        };
        assert_eq!(n[[0, 1].as_slice()], 0);
        assert_eq!(n[[1, 0].as_slice()], 0);
        let Some(VariableData::Float(x)) = ds.variable("x") else {
            panic!("x should be a float variable");
        };
        assert!(x[[0, 1].as_slice()].is_nan());
        assert_eq!(x[[1, 1].as_slice()], 1.5);
    }

    #[test]
    fn duplicate_keys_keep_the_last_record() {
        let corpus = typed(&[(1, &[&[("zip", "1"), ("n", "1")], &[("zip", "1"), ("n", "2")]])]);

        let ds = build_dataset(&corpus, &zip_options()).unwrap();
        let Some(VariableData::Integer(n)) = ds.variable("n") else {
            panic!("n should be an integer variable");
        };
        assert_eq!(n.shape(), [1, 1]);
        assert_eq!(n[[0, 0].as_slice()], 2);
    }

    #[test]
    fn coordinates_project_onto_their_dimension() {
        let corpus = typed(&[
            (
                1,
                &[
                    &[("zip", "1"), ("city", "A"), ("lat", "")],
                    &[("zip", "2"), ("city", "B"), ("lat", "4.5")],
                ],
            ),
            (2, &[&[("zip", "1"), ("city", "A"), ("lat", "")]]),
        ]);
        let options = zip_options()
            .with_coordinate("city", "zip")
            .with_coordinate("lat", "zip");

        let ds = build_dataset(&corpus, &options).unwrap();
        let city = &ds.coordinates()["city"];
        assert_eq!(city.dimension, "zip");
        assert_eq!(
            city.values,
            [
                Some(CellValue::String("A".to_string())),
                Some(CellValue::String("B".to_string()))
            ]
        );
        let lat = &ds.coordinates()["lat"];
        assert!(matches!(lat.values[0], Some(CellValue::Float(v)) if v.is_nan()));
        assert!(ds.variable("lat").is_none());
        assert!(ds.variable("city").is_none());
        assert_eq!(ds.dims(), ["time", "zip"]);
    }

    #[test]
    fn conflicting_coordinates_fail() {
        let corpus = typed(&[
            (1, &[&[("zip", "1"), ("city", "A")]]),
            (2, &[&[("zip", "1"), ("city", "B")]]),
        ]);
        let options = zip_options().with_coordinate("city", "zip");

        let err = build_dataset(&corpus, &options).unwrap_err();
        assert!(matches!(
            err,
            CompileError::CoordinateConflict { ref coordinate, .. } if coordinate == "city"
        ));
    }

    #[test]
    fn declarations_are_checked_against_the_corpus() {
        let corpus = typed(&[(1, &[&[("zip", "1"), ("city", "A")]])]);

        let err = build_dataset(&corpus, &CompileOptions::default().with_dimension("state"))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownField(ref f) if f == "state"));

        let err = build_dataset(
            &corpus,
            &CompileOptions::default().with_coordinate("city", "zip"),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredDimension { .. }));

        let err = build_dataset(&corpus, &zip_options().with_coordinate("zip", "zip"))
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidDeclaration(_)));
    }

    #[test]
    fn numeric_field_named_time_is_rejected() {
        let corpus = typed(&[(1, &[&[("time", "5"), ("n", "1")]])]);

        let err = build_dataset(&corpus, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidDeclaration(ref m) if m.contains("'time'")));
        assert_eq!(err.category(), crate::error::ErrorCategory::Declaration);

        // A string field named `time` never becomes a variable.
        let corpus = typed(&[(1, &[&[("time", "noon"), ("n", "1")]])]);
        let ds = build_dataset(&corpus, &CompileOptions::default()).unwrap();
        assert!(ds.variable("time").is_none());
        assert!(ds.variable("n").is_some());
    }

    #[test]
    fn records_missing_a_dimension_are_rejected() {
        let corpus = typed(&[
            (1, &[&[("zip", "north"), ("n", "1")]]),
            (2, &[&[("n", "2")]]),
        ]);

        let err = build_dataset(&corpus, &zip_options()).unwrap_err();
        assert!(matches!(err, CompileError::MissingDimensionValue { .. }));
    }

    #[test]
    fn no_dimensions_yields_a_time_series() {
        let corpus = typed(&[(2, &[&[("n", "5")]]), (1, &[&[("n", "4")]])]);

        let ds = build_dataset(&corpus, &CompileOptions::default()).unwrap();
        assert_eq!(ds.time(), [ts(1), ts(2)]);
        let Some(VariableData::Integer(n)) = ds.variable("n") else {
            panic!("n should be an integer variable");
        };
        assert_eq!(n.iter().copied().collect::<Vec<_>>(), [4, 5]);
    }
}
