//! `issuesync apply` command.

use std::path::Path;

use crate::context::ServiceContext;
use crate::ports::filesystem::FileSystem;
use crate::ports::store::ObjectStore;
use crate::reconcile::RepoRef;
use crate::resource::{IssueManifest, IssueObject};

/// Execute the `apply` command.
///
/// # Errors
///
/// Returns an error string if the manifest cannot be read, parsed or stored.
pub fn run(ctx: &ServiceContext, manifest: &Path) -> Result<(), String> {
    let store = ctx.store();
    let object = apply_manifest(ctx.fs.as_ref(), store.as_ref(), manifest)?;
    println!(
        "{} applied (resource version {})",
        object.key(),
        object.metadata.resource_version
    );
    Ok(())
}

/// Reads a manifest and creates or updates the object it declares.
///
/// The repository URL is checked up front so a typo is reported here
/// rather than on every reconcile pass.
///
/// # Errors
///
/// Returns an error string if the manifest is unreadable or invalid, or the store write fails.
pub fn apply_manifest(
    fs: &dyn FileSystem,
    store: &dyn ObjectStore,
    manifest: &Path,
) -> Result<IssueObject, String> {
    let yaml = fs
        .read_to_string(manifest)
        .map_err(|e| format!("Failed to read {}: {e}", manifest.display()))?;
    let manifest = IssueManifest::from_yaml(&yaml)?;
    RepoRef::parse(&manifest.spec.repo).map_err(|e| e.to_string())?;
    if manifest.spec.title.trim().is_empty() {
        return Err("spec.title must not be empty".to_string());
    }
    store.apply(&manifest.key(), manifest.spec).map_err(|e| e.to_string())
}
