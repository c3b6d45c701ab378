//! Data layer: snapshot loading, type inference, and array compilation.
//!
//! Architecture:
//! ```text
//!  <stem>.csv + <stem>.headers  (one pair per snapshot)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  Last-Modified + raw rows → RawCorpus
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  infer    │  classify every field, then coerce → TypedCorpus
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  builder  │  axes, coordinate projections, dense arrays → CompiledDataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  select   │  label-based lookups for the shell
//!   └──────────┘
//! ```

pub mod builder;
pub mod dataset;
pub mod infer;
pub mod loader;
pub mod model;
pub mod select;
