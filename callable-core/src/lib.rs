//! # Core models and line filters for CallableLoci region lists.
//!
//! This crate holds the in-process pieces of the callable-loci pipeline: the [`Region`](models::Region)
//! record, the callable/autosomal line filters, surveyed-length summation and gzip-aware readers.
//! Interval algebra (intersect, sort, merge) is not implemented here; the pipeline crate delegates it
//! to an external interval toolkit.
//!
pub mod errors;
pub mod filters;
pub mod models;
pub mod survey;
pub mod utils;

// re-expose core functions
pub use errors::*;
pub use filters::*;
pub use survey::*;
