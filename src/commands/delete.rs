//! `issuesync delete` command.

use crate::context::ServiceContext;
use crate::ports::store::ObjectStore;
use crate::resource::ObjectKey;

/// Execute the `delete` command.
///
/// # Errors
///
/// Returns an error string if the key is malformed or the object does not exist.
pub fn run(ctx: &ServiceContext, key: &str) -> Result<(), String> {
    let key: ObjectKey = key.parse()?;
    if request(ctx.store().as_ref(), &key)? {
        println!("{key} deleted");
    } else {
        println!("{key} marked for deletion; the remote issue is closed on the next reconcile");
    }
    Ok(())
}

/// Requests deletion and reports whether the object is already gone.
///
/// Objects still holding a finalizer stay in the store until a reconcile
/// pass closes their remote issue.
///
/// # Errors
///
/// Returns an error string if the store refuses the request.
pub fn request(store: &dyn ObjectStore, key: &ObjectKey) -> Result<bool, String> {
    store.request_deletion(key).map_err(|e| e.to_string())?;
    Ok(store.get(key).map_err(|e| e.to_string())?.is_none())
}
