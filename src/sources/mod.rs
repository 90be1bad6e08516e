//! Package source implementations.
//!
//! Each module provides a struct implementing [`crate::source::PackageSource`].

pub mod catalog;

pub use catalog::{CatalogEntry, CatalogSource, CatalogVersion};
