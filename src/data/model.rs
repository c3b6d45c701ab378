use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// CellValue – a single typed cell of a snapshot record
// ---------------------------------------------------------------------------

/// A typed cell value. Every value of one field shares the same variant once
/// the inferrer has classified that field.
///
/// Axis construction puts values in `BTreeSet`s, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    String(String),
}

// -- Manual Eq/Ord so NaN floats sort and dedup like any other value --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Integer(_) => 0,
                Float(_) => 1,
                String(_) => 2,
            }
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl CellValue {
    /// Coordinate agreement: plain equality, except that two NaNs agree.
    pub fn agrees_with(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Float(a), CellValue::Float(b)) if a.is_nan() && b.is_nan() => true,
            _ => self == other,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Field classification
// ---------------------------------------------------------------------------

/// Corpus-wide type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldKind {
    #[serde(rename = "int64")]
    Integer,
    #[serde(rename = "float64")]
    Float,
    #[serde(rename = "string")]
    String,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Float)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Integer => write!(f, "int64"),
            FieldKind::Float => write!(f, "float64"),
            FieldKind::String => write!(f, "string"),
        }
    }
}

/// One [`FieldKind`] per field name, decided over every snapshot at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    kinds: BTreeMap<String, FieldKind>,
}

impl Classification {
    pub fn insert(&mut self, field: impl Into<String>, kind: FieldKind) {
        self.kinds.insert(field.into(), kind);
    }

    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.kinds.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Field names classified as `kind`, sorted.
    pub fn fields_of(&self, kind: FieldKind) -> BTreeSet<String> {
        self.kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn integer_fields(&self) -> BTreeSet<String> {
        self.fields_of(FieldKind::Integer)
    }

    pub fn float_fields(&self) -> BTreeSet<String> {
        self.fields_of(FieldKind::Float)
    }

    pub fn string_fields(&self) -> BTreeSet<String> {
        self.fields_of(FieldKind::String)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Corpora – loader output and inferrer output
// ---------------------------------------------------------------------------

/// One CSV row as read from disk: field name → raw token.
pub type RawRecord = BTreeMap<String, String>;

/// One CSV row after coercion. Absent string values stay absent.
pub type TypedRecord = BTreeMap<String, CellValue>;

/// Everything the loader read from one directory.
#[derive(Debug, Clone, Default)]
pub struct RawCorpus {
    /// Snapshot timestamp → rows in file order.
    pub snapshots: BTreeMap<DateTime<Utc>, Vec<RawRecord>>,
    /// Union of field names across every snapshot.
    pub field_names: BTreeSet<String>,
}

impl RawCorpus {
    /// Iterate over every record of every snapshot.
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.snapshots.values().flatten()
    }

    pub fn record_count(&self) -> usize {
        self.snapshots.values().map(Vec::len).sum()
    }
}

/// The corpus after type inference.
#[derive(Debug, Clone, Default)]
pub struct TypedCorpus {
    pub snapshots: BTreeMap<DateTime<Utc>, Vec<TypedRecord>>,
    pub field_names: BTreeSet<String>,
    pub classification: Classification,
}

impl TypedCorpus {
    /// Iterate over every record of every snapshot.
    pub fn records(&self) -> impl Iterator<Item = &TypedRecord> {
        self.snapshots.values().flatten()
    }
}
