//! Splicing of metadata records for the same package from different sources.
//!
//! The merged record is built in constant time: its version list is a new
//! lazy factory that, when first awaited, awaits both inputs' version lists
//! concurrently and unions them.

use futures::future::join;

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::types::union_versions;

/// Merge two records describing the same package id.
///
/// The record with the higher version becomes the base (ties keep `a`).
/// The merged version list is the union of both lists, keeping the highest
/// download count per duplicate version.
///
/// # Errors
///
/// Returns [`SearchError::SplicerMismatch`] if the ids differ
/// (case-insensitively).
pub fn splice(
    a: &PackageSearchMetadata,
    b: &PackageSearchMetadata,
) -> Result<PackageSearchMetadata, SearchError> {
    if !a.identity.same_id(&b.identity) {
        return Err(SearchError::SplicerMismatch {
            left: a.identity.id.clone(),
            right: b.identity.id.clone(),
        });
    }

    let base = if b.identity.version > a.identity.version {
        b
    } else {
        a
    };

    let left = a.clone();
    let right = b.clone();
    Ok(base.clone().with_version_factory(async move {
        let (left, right) = join(left.versions(), right.versions()).await;
        union_versions(left.iter().chain(right.iter()).cloned())
    }))
}
