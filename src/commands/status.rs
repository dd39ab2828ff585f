//! `issuesync status` command.

use std::fmt::Write as _;

use crate::context::ServiceContext;
use crate::ports::store::ObjectStore;
use crate::resource::{IssueObject, ObjectKey, CONDITION_ISSUE_HAS_PR, CONDITION_ISSUE_IS_OPEN};

/// Execute the `status` command.
///
/// Without a key, prints a table of every object with its condition
/// values. With a key, prints that object's conditions in full.
///
/// # Errors
///
/// Returns an error string if the key is malformed or the store cannot be read.
pub fn run(ctx: &ServiceContext, key: Option<&str>) -> Result<(), String> {
    let store = ctx.store();
    match key {
        Some(key) => {
            let key: ObjectKey = key.parse()?;
            let object = store
                .get(&key)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("object {key} not found"))?;
            print!("{}", render_detail(&object));
        }
        None => {
            let objects = load_all(store.as_ref())?;
            if objects.is_empty() {
                println!("No issue objects found in store.");
                return Ok(());
            }
            print!("{}", render_table(&objects));
            println!("\n{} object(s) total.", objects.len());
        }
    }
    Ok(())
}

fn load_all(store: &dyn ObjectStore) -> Result<Vec<IssueObject>, String> {
    let mut objects = Vec::new();
    for key in store.list().map_err(|e| e.to_string())? {
        // Deleted between list and get.
        if let Some(object) = store.get(&key).map_err(|e| e.to_string())? {
            objects.push(object);
        }
    }
    Ok(objects)
}

fn condition_value(object: &IssueObject, type_: &str) -> String {
    object.status.condition(type_).map_or_else(|| "-".to_string(), |c| c.status.to_string())
}

/// Renders one row per object: key, title, and the two condition values.
#[must_use]
pub fn render_table(objects: &[IssueObject]) -> String {
    let rows: Vec<[String; 4]> = objects
        .iter()
        .map(|object| {
            let key = if object.is_deleting() {
                format!("{} (deleting)", object.key())
            } else {
                object.key().to_string()
            };
            [
                key,
                object.spec.title.clone(),
                condition_value(object, CONDITION_ISSUE_IS_OPEN),
                condition_value(object, CONDITION_ISSUE_HAS_PR),
            ]
        })
        .collect();

    let header = ["KEY", "TITLE", "OPEN", "HAS PR"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let [key_w, title_w, open_w, pr_w] = widths;

    let mut out = String::new();
    let _ = writeln!(out, "{:<key_w$}  {:<title_w$}  {:<open_w$}  {:<pr_w$}", header[0], header[1], header[2], header[3]);
    let _ = writeln!(out, "{:-<key_w$}  {:-<title_w$}  {:-<open_w$}  {:-<pr_w$}", "", "", "", "");
    for [key, title, open, pr] in &rows {
        let _ = writeln!(out, "{key:<key_w$}  {title:<title_w$}  {open:<open_w$}  {pr:<pr_w$}");
    }
    out
}

/// Renders a single object with its conditions.
#[must_use]
pub fn render_detail(object: &IssueObject) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Key:         {}", object.key());
    let _ = writeln!(out, "Repository:  {}", object.spec.repo);
    let _ = writeln!(out, "Title:       {}", object.spec.title);
    let finalizers = if object.metadata.finalizers.is_empty() {
        "-".to_string()
    } else {
        object.metadata.finalizers.join(", ")
    };
    let _ = writeln!(out, "Finalizers:  {finalizers}");
    if let Some(at) = object.metadata.deletion_timestamp {
        let _ = writeln!(out, "Deleting:    since {}", at.to_rfc3339());
    }
    if object.status.conditions.is_empty() {
        let _ = writeln!(out, "Conditions:  none observed yet");
        return out;
    }
    let _ = writeln!(out, "Conditions:");
    for condition in &object.status.conditions {
        let since = condition
            .last_transition_time
            .map(|t| format!(" since {}", t.to_rfc3339()))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {}={} ({}): {}{since}",
            condition.type_, condition.status, condition.reason, condition.message
        );
    }
    out
}
