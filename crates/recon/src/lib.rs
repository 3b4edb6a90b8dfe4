//! `parcelmerge-recon`: multi-source property record reconciliation.
//!
//! Pure engine crate: receives already-fetched provider records, returns one
//! canonical property entity plus a merge report (conflicts, provenance,
//! completeness). No CLI, network or filesystem dependencies.

pub mod completeness;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod raw;
pub mod resolve;
pub mod summary;

pub use config::ReconConfig;
pub use engine::Reconciler;
pub use error::ReconError;
pub use model::{Conflict, MergeResult, PropertyEntity, SourceKind, SourceMeta};
pub use raw::{MergeInput, RawRecord};
pub use resolve::ResolutionStrategy;
pub use summary::{summarize, MergeSummary};
