use log::debug;

use super::model::{
    CellValue, Classification, FieldKind, RawCorpus, RawRecord, TypedCorpus, TypedRecord,
};
use crate::error::{CompileError, Result};

/// Classify every field, then coerce every record into a new typed corpus.
pub fn infer_types(raw: RawCorpus) -> Result<TypedCorpus> {
    let classification = classify_fields(&raw);
    let RawCorpus {
        snapshots,
        field_names,
    } = raw;

    let mut typed = TypedCorpus {
        field_names,
        classification,
        ..TypedCorpus::default()
    };
    for (timestamp, records) in snapshots {
        let rows = records
            .iter()
            .map(|record| coerce_record(record, &typed.classification))
            .collect::<Result<Vec<_>>>()?;
        typed.snapshots.insert(timestamp, rows);
    }

    Ok(typed)
}

// ---------------------------------------------------------------------------
// Phase 1 – classification
// ---------------------------------------------------------------------------

/// Decide one [`FieldKind`] per field from every value in the corpus.
///
/// A field is integer only when no value is empty or absent and every value
/// parses as `i64`. Otherwise it is float when every non-empty value parses as
/// `f64`, and string as soon as one does not.
pub fn classify_fields(raw: &RawCorpus) -> Classification {
    let mut classification = Classification::default();
    for field in &raw.field_names {
        let kind = classify_values(raw.records().map(|record| raw_value(record, field)));
        debug!("field '{field}' classified as {kind}");
        classification.insert(field.clone(), kind);
    }
    classification
}

fn classify_values<'a>(values: impl Iterator<Item = Option<&'a str>>) -> FieldKind {
    let mut all_integer = true;
    for value in values {
        let Some(token) = value else {
            all_integer = false;
            continue;
        };
        if all_integer && parse_integer(token).is_none() {
            all_integer = false;
        }
        if parse_float(token).is_none() {
            return FieldKind::String;
        }
    }
    if all_integer {
        FieldKind::Integer
    } else {
        FieldKind::Float
    }
}

/// The token for `field`, or `None` when it is absent or exactly `""`.
/// A whitespace-only token is not empty.
fn raw_value<'a>(record: &'a RawRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn parse_integer(token: &str) -> Option<i64> {
    token.trim().parse::<i64>().ok()
}

fn parse_float(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Phase 2 – coercion
// ---------------------------------------------------------------------------

fn coerce_record(record: &RawRecord, classification: &Classification) -> Result<TypedRecord> {
    let mut typed = TypedRecord::new();
    for (field, kind) in classification.iter() {
        if let Some(value) = coerce_value(field, kind, record)? {
            typed.insert(field.to_string(), value);
        }
    }
    Ok(typed)
}

fn coerce_value(field: &str, kind: FieldKind, record: &RawRecord) -> Result<Option<CellValue>> {
    let inconsistent = |value: &str| CompileError::TypeInconsistency {
        field: field.to_string(),
        value: value.to_string(),
    };

    let value = match kind {
        FieldKind::String => record.get(field).cloned().map(CellValue::String),
        FieldKind::Integer => {
            let token = raw_value(record, field).ok_or_else(|| inconsistent(""))?;
            let parsed = parse_integer(token).ok_or_else(|| inconsistent(token))?;
            Some(CellValue::Integer(parsed))
        }
        FieldKind::Float => match raw_value(record, field) {
            None => Some(CellValue::Float(f64::NAN)),
            Some(token) => {
                let parsed = parse_float(token).ok_or_else(|| inconsistent(token))?;
                Some(CellValue::Float(parsed))
            }
        },
    };
    Ok(value)
}
