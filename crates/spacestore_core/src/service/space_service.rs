//! Space use-case service.
//!
//! # Responsibility
//! - Own transaction boundaries for callers that do not manage their own.
//! - Normalize user-facing input before it reaches the repository.
//!
//! # Invariants
//! - Every mutation runs in exactly one transaction that is committed only
//!   after the repository call succeeds; a failed call rolls back on drop.
//! - Service layer never bypasses repository validation.

use crate::context::RequestContext;
use crate::model::space::{Space, SpaceType, SpaceValidationError};
use crate::repo::space_repo::{SpaceRepoError, SpaceRepoResult, SpaceStore, SqliteSpaceStore};
use log::{info, warn};
use rusqlite::{Connection, Transaction};

/// Transaction-owning facade over a `SpaceStore`.
pub struct SpaceService<'conn, S: SpaceStore> {
    conn: &'conn Connection,
    store: S,
}

impl<'conn> SpaceService<'conn, SqliteSpaceStore<'conn>> {
    /// Creates a service whose reads and write transactions share `conn`.
    pub fn try_new(conn: &'conn Connection) -> SpaceRepoResult<Self> {
        Ok(Self::new(conn, SqliteSpaceStore::try_new(conn)?))
    }
}

impl<'conn, S: SpaceStore> SpaceService<'conn, S> {
    /// Creates a service that opens its write transactions on `conn`.
    ///
    /// `store` must read through the same connection, otherwise the stored
    /// record returned after a write may not be visible to later reads.
    /// Prefer `SpaceService::try_new` for the SQLite store.
    pub fn new(conn: &'conn Connection, store: S) -> Self {
        Self { conn, store }
    }

    /// Creates a space with a generated reference id in the context org.
    pub fn create_space(
        &self,
        ctx: &RequestContext,
        name: impl Into<String>,
        kind: SpaceType,
    ) -> SpaceRepoResult<Space> {
        let name = normalize_name(name.into())?;
        let space = Space::new(ctx.org_id.clone(), name, kind);
        self.add_space(ctx, &space)
    }

    /// Inserts a caller-built space (for example one with an imported ref id).
    pub fn add_space(&self, ctx: &RequestContext, space: &Space) -> SpaceRepoResult<Space> {
        let stored = self.in_transaction("add", &space.ref_id, |tx| {
            self.store.add(tx, ctx, space)
        })?;
        info!(
            "event=space_add module=space_service status=ok org_id={} ref_id={} type={}",
            stored.org_id,
            stored.ref_id,
            stored.kind.to_db()
        );
        Ok(stored)
    }

    pub fn get_space(&self, ctx: &RequestContext, ref_id: &str) -> SpaceRepoResult<Space> {
        self.store.get(ctx, ref_id)
    }

    pub fn list_public(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>> {
        self.store.public_spaces(ctx, &ctx.org_id)
    }

    pub fn list_viewable(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>> {
        self.store.get_viewable(ctx)
    }

    /// Administrative listing that ignores permission grants.
    pub fn list_all(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>> {
        self.store.get_all(ctx)
    }

    /// Writes mutable fields of an existing space.
    pub fn update_space(&self, ctx: &RequestContext, space: &Space) -> SpaceRepoResult<Space> {
        let mut normalized = space.clone();
        normalized.name = normalize_name(normalized.name)?;
        let stored = self.in_transaction("update", &space.ref_id, |tx| {
            self.store.update(tx, ctx, &normalized)
        })?;
        info!(
            "event=space_update module=space_service status=ok org_id={} ref_id={} revised={}",
            stored.org_id, stored.ref_id, stored.revised
        );
        Ok(stored)
    }

    /// Removes a space. Returns the number of removed rows.
    pub fn delete_space(&self, ctx: &RequestContext, ref_id: &str) -> SpaceRepoResult<usize> {
        let removed = self.in_transaction("delete", ref_id, |tx| {
            self.store.delete(tx, ctx, ref_id)
        })?;
        if removed == 0 {
            warn!(
                "event=space_delete module=space_service status=noop org_id={} ref_id={}",
                ctx.org_id, ref_id
            );
        } else {
            info!(
                "event=space_delete module=space_service status=ok org_id={} ref_id={} rows={}",
                ctx.org_id, ref_id, removed
            );
        }
        Ok(removed)
    }

    fn in_transaction<T>(
        &self,
        operation: &'static str,
        key: &str,
        body: impl FnOnce(&Transaction<'_>) -> SpaceRepoResult<T>,
    ) -> SpaceRepoResult<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|err| storage_error(operation, key, err))?;
        let value = body(&tx).inspect_err(|err| {
            warn!(
                "event=space_{operation} module=space_service status=error key={key} error={err}"
            );
        })?;
        tx.commit()
            .map_err(|err| storage_error(operation, key, err))?;
        Ok(value)
    }
}

fn storage_error(operation: &'static str, key: &str, err: rusqlite::Error) -> SpaceRepoError {
    SpaceRepoError::Storage {
        operation,
        key: key.to_string(),
        source: err.into(),
    }
}

fn normalize_name(value: String) -> SpaceRepoResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SpaceValidationError::EmptyName.into());
    }
    Ok(trimmed.to_string())
}
