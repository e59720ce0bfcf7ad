//! Org-scoped statement helpers shared by entity stores.
//!
//! # Invariants
//! - Every statement filters by both `org_id` and `ref_id`.
//! - Table names are checked against `CONSTRAINED_TABLES` before they are
//!   interpolated into SQL.

use super::{DbError, DbResult};
use log::debug;
use rusqlite::{params, Connection};

/// Tables that carry `org_id` + `ref_id` columns and may be targeted by
/// `delete_constrained`.
pub const CONSTRAINED_TABLES: &[&str] = &["space", "permission"];

/// Deletes rows of `table` matching one organization and reference id.
///
/// Returns the number of removed rows. Zero is not an error.
///
/// # Errors
/// - `DbError::UnknownTable` when `table` is not in `CONSTRAINED_TABLES`.
/// - `DbError::Sqlite` when the statement fails.
pub fn delete_constrained(
    conn: &Connection,
    table: &str,
    org_id: &str,
    ref_id: &str,
) -> DbResult<usize> {
    if !CONSTRAINED_TABLES.contains(&table) {
        return Err(DbError::UnknownTable(table.to_string()));
    }

    let removed = conn.execute(
        &format!("DELETE FROM {table} WHERE org_id = ?1 AND ref_id = ?2;"),
        params![org_id, ref_id],
    )?;
    debug!("event=delete_constrained module=db table={table} rows={removed}");
    Ok(removed)
}
