//! Space repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide org-scoped CRUD APIs over canonical `space` storage.
//! - Compute permission-filtered listings from `permission` and
//!   `group_member` rows without ever writing them.
//!
//! # Invariants
//! - Every statement filters by organization id.
//! - Write paths call `Space::validate()` before SQL mutations and run inside
//!   the caller's transaction. Read paths only reject undecodable columns so
//!   one legacy row never hides the rest of the organization.
//! - `get` reports a missing row as `NotFound`; listings report absence as
//!   an empty vector.
//! - `update` reports a missing row as `NotFound`; `delete` reports the
//!   removed row count and treats zero as success.

use crate::context::RequestContext;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{delete_constrained, table_exists, table_has_column, DbError};
use crate::model::space::{
    now_epoch_ms, Space, SpaceLifecycle, SpaceType, SpaceValidationError,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Subject id or group member id that matches every user.
pub const EVERYONE_ID: &str = "0";

/// Permission location for space-level grants.
pub const SPACE_LOCATION: &str = "space";

/// Permission action required for visibility.
pub const VIEW_ACTION: &str = "view";

const SPACE_TABLE: &str = "space";

/// Column list shared by every space read. `parse_space_row` decodes
/// exactly these names.
const SPACE_COLUMNS: &[&str] = &[
    "id",
    "ref_id",
    "name",
    "org_id",
    "user_id",
    "type",
    "lifecycle",
    "likes",
    "created",
    "revised",
];

const SPACE_SELECT_SQL: &str = "SELECT
    id,
    ref_id,
    name,
    org_id,
    user_id,
    type,
    lifecycle,
    likes,
    created,
    revised
FROM space";

const PERMISSION_COLUMNS: &[&str] = &["org_id", "who", "who_id", "action", "location", "ref_id"];
const GROUP_MEMBER_COLUMNS: &[&str] = &["org_id", "group_id", "user_id"];

pub type SpaceRepoResult<T> = Result<T, SpaceRepoError>;

/// Errors from space repository operations.
#[derive(Debug)]
pub enum SpaceRepoError {
    Validation(SpaceValidationError),
    /// Space belongs to a different organization than the request context.
    OrganizationMismatch {
        context_org_id: String,
        space_org_id: String,
    },
    /// No space with this reference id exists in the organization.
    NotFound { org_id: String, ref_id: String },
    /// Insert collided with an existing `(org_id, ref_id)`.
    Conflict { org_id: String, ref_id: String },
    /// Statement or connection failure, tagged with operation and key.
    Storage {
        operation: &'static str,
        key: String,
        source: DbError,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted to a valid `Space`.
    InvalidData(String),
}

impl SpaceRepoError {
    fn storage(operation: &'static str, key: &str, source: impl Into<DbError>) -> Self {
        Self::Storage {
            operation,
            key: key.to_string(),
            source: source.into(),
        }
    }

    /// Returns whether this error means the addressed space does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for SpaceRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::OrganizationMismatch {
                context_org_id,
                space_org_id,
            } => write!(
                f,
                "space belongs to org `{space_org_id}` but request is scoped to `{context_org_id}`"
            ),
            Self::NotFound { org_id, ref_id } => {
                write!(f, "space not found: {ref_id} (org {org_id})")
            }
            Self::Conflict { org_id, ref_id } => {
                write!(f, "space already exists: {ref_id} (org {org_id})")
            }
            Self::Storage {
                operation,
                key,
                source,
            } => write!(f, "space {operation} failed for {key}: {source}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "space repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "space repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "space repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted space data: {message}"),
        }
    }
}

impl Error for SpaceRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SpaceValidationError> for SpaceRepoError {
    fn from(value: SpaceValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for space persistence.
///
/// Reads go through the repository's own connection. Mutations take the
/// caller's open transaction so they can be combined atomically with other
/// writes (for example permission grants).
pub trait SpaceStore {
    /// Inserts a new space owned by the current user and returns the stored
    /// record, including the storage-assigned `id`.
    fn add(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        space: &Space,
    ) -> SpaceRepoResult<Space>;
    /// Loads one space of the context organization.
    fn get(&self, ctx: &RequestContext, ref_id: &str) -> SpaceRepoResult<Space>;
    /// Lists public spaces of `org_id`.
    fn public_spaces(&self, ctx: &RequestContext, org_id: &str) -> SpaceRepoResult<Vec<Space>>;
    /// Lists spaces the current user may view, sorted by name.
    fn get_viewable(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>>;
    /// Lists every space of the context organization, sorted by name.
    fn get_all(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>>;
    /// Writes mutable fields and returns the stored record.
    fn update(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        space: &Space,
    ) -> SpaceRepoResult<Space>;
    /// Removes one space of the context organization. Returns removed rows.
    fn delete(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        ref_id: &str,
    ) -> SpaceRepoResult<usize>;
}

/// SQLite-backed space repository.
pub struct SqliteSpaceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpaceStore<'conn> {
    /// Creates repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not carry what the queries read.
    pub fn try_new(conn: &'conn Connection) -> SpaceRepoResult<Self> {
        ensure_space_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SpaceStore for SqliteSpaceStore<'_> {
    fn add(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        space: &Space,
    ) -> SpaceRepoResult<Space> {
        ensure_same_org(ctx, space)?;

        let now = now_epoch_ms();
        let mut stored = space.clone();
        stored.user_id = ctx.user_id.clone();
        stored.created = now;
        stored.revised = now;
        stored.validate()?;

        tx.execute(
            "INSERT INTO space (
                ref_id,
                name,
                org_id,
                user_id,
                type,
                lifecycle,
                likes,
                created,
                revised
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                stored.ref_id.as_str(),
                stored.name.as_str(),
                stored.org_id.as_str(),
                stored.user_id.as_str(),
                stored.kind.to_db(),
                stored.lifecycle.to_db(),
                stored.likes,
                stored.created,
                stored.revised,
            ],
        )
        .map_err(|err| {
            let err = DbError::from(err);
            if err.is_constraint_violation() {
                SpaceRepoError::Conflict {
                    org_id: stored.org_id.clone(),
                    ref_id: stored.ref_id.clone(),
                }
            } else {
                SpaceRepoError::storage("add", &stored.ref_id, err)
            }
        })?;

        stored.id = tx.last_insert_rowid();
        Ok(stored)
    }

    fn get(&self, ctx: &RequestContext, ref_id: &str) -> SpaceRepoResult<Space> {
        load_space(self.conn, "get", &ctx.org_id, ref_id)?.ok_or_else(|| {
            SpaceRepoError::NotFound {
                org_id: ctx.org_id.clone(),
                ref_id: ref_id.to_string(),
            }
        })
    }

    fn public_spaces(&self, _ctx: &RequestContext, org_id: &str) -> SpaceRepoResult<Vec<Space>> {
        select_spaces(
            self.conn,
            "public_spaces",
            org_id,
            &format!(
                "{SPACE_SELECT_SQL}
                 WHERE org_id = ?1 AND type = ?2
                 ORDER BY name ASC, ref_id ASC;"
            ),
            params![org_id, SpaceType::Public.to_db()],
        )
    }

    fn get_viewable(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>> {
        // Union of direct user grants and grants to roles the user belongs
        // to; `IN` collapses duplicate grants to one row per space.
        select_spaces(
            self.conn,
            "get_viewable",
            &ctx.org_id,
            &format!(
                "{SPACE_SELECT_SQL}
                 WHERE org_id = ?1
                   AND ref_id IN (
                     SELECT ref_id
                     FROM permission
                     WHERE org_id = ?1
                       AND who = 'user'
                       AND (who_id = ?2 OR who_id = ?3)
                       AND location = ?4
                       AND action = ?5
                     UNION ALL
                     SELECT p.ref_id
                     FROM permission p
                     JOIN group_member r
                       ON r.org_id = p.org_id AND r.group_id = p.who_id
                     WHERE p.org_id = ?1
                       AND p.who = 'role'
                       AND p.location = ?4
                       AND p.action = ?5
                       AND (r.user_id = ?2 OR r.user_id = ?3)
                   )
                 ORDER BY name ASC, ref_id ASC;"
            ),
            params![
                ctx.org_id.as_str(),
                ctx.user_id.as_str(),
                EVERYONE_ID,
                SPACE_LOCATION,
                VIEW_ACTION,
            ],
        )
    }

    fn get_all(&self, ctx: &RequestContext) -> SpaceRepoResult<Vec<Space>> {
        select_spaces(
            self.conn,
            "get_all",
            &ctx.org_id,
            &format!(
                "{SPACE_SELECT_SQL}
                 WHERE org_id = ?1
                 ORDER BY name ASC, ref_id ASC;"
            ),
            [ctx.org_id.as_str()],
        )
    }

    fn update(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        space: &Space,
    ) -> SpaceRepoResult<Space> {
        ensure_same_org(ctx, space)?;
        space.validate_owned()?;

        // `revised` must strictly increase even when two updates land in the
        // same millisecond.
        let changed = tx
            .execute(
                "UPDATE space
                 SET
                    name = ?1,
                    type = ?2,
                    lifecycle = ?3,
                    user_id = ?4,
                    likes = ?5,
                    revised = MAX(?6, revised + 1)
                 WHERE org_id = ?7 AND ref_id = ?8;",
                params![
                    space.name.as_str(),
                    space.kind.to_db(),
                    space.lifecycle.to_db(),
                    space.user_id.as_str(),
                    space.likes,
                    now_epoch_ms(),
                    ctx.org_id.as_str(),
                    space.ref_id.as_str(),
                ],
            )
            .map_err(|err| SpaceRepoError::storage("update", &space.ref_id, err))?;

        if changed == 0 {
            return Err(SpaceRepoError::NotFound {
                org_id: ctx.org_id.clone(),
                ref_id: space.ref_id.clone(),
            });
        }

        load_space(tx, "update", &ctx.org_id, &space.ref_id)?.ok_or_else(|| {
            SpaceRepoError::NotFound {
                org_id: ctx.org_id.clone(),
                ref_id: space.ref_id.clone(),
            }
        })
    }

    fn delete(
        &self,
        tx: &Transaction<'_>,
        ctx: &RequestContext,
        ref_id: &str,
    ) -> SpaceRepoResult<usize> {
        delete_constrained(tx, SPACE_TABLE, &ctx.org_id, ref_id)
            .map_err(|err| SpaceRepoError::storage("delete", ref_id, err))
    }
}

fn ensure_same_org(ctx: &RequestContext, space: &Space) -> SpaceRepoResult<()> {
    if space.org_id != ctx.org_id {
        return Err(SpaceRepoError::OrganizationMismatch {
            context_org_id: ctx.org_id.clone(),
            space_org_id: space.org_id.clone(),
        });
    }
    Ok(())
}

fn load_space(
    conn: &Connection,
    operation: &'static str,
    org_id: &str,
    ref_id: &str,
) -> SpaceRepoResult<Option<Space>> {
    let tag = |err: rusqlite::Error| SpaceRepoError::storage(operation, ref_id, err);
    let mut stmt = conn
        .prepare(&format!(
            "{SPACE_SELECT_SQL}
             WHERE org_id = ?1 AND ref_id = ?2;"
        ))
        .map_err(tag)?;

    let row = stmt
        .query_row(params![org_id, ref_id], |row| Ok(parse_space_row(row)))
        .optional()
        .map_err(tag)?;
    row.transpose()
}

fn select_spaces<P: Params>(
    conn: &Connection,
    operation: &'static str,
    key: &str,
    sql: &str,
    params: P,
) -> SpaceRepoResult<Vec<Space>> {
    let tag = |err: rusqlite::Error| SpaceRepoError::storage(operation, key, err);
    let mut stmt = conn.prepare(sql).map_err(tag)?;
    let mut rows = stmt.query(params).map_err(tag)?;
    let mut spaces = Vec::new();

    while let Some(row) = rows.next().map_err(tag)? {
        spaces.push(parse_space_row(row)?);
    }

    Ok(spaces)
}

fn parse_space_row(row: &Row<'_>) -> SpaceRepoResult<Space> {
    let type_value: i64 = column(row, "type")?;
    let kind = SpaceType::from_db(type_value).ok_or_else(|| {
        SpaceRepoError::InvalidData(format!("invalid space type `{type_value}` in space.type"))
    })?;

    let lifecycle_value: i64 = column(row, "lifecycle")?;
    let lifecycle = SpaceLifecycle::from_db(lifecycle_value).ok_or_else(|| {
        SpaceRepoError::InvalidData(format!(
            "invalid lifecycle `{lifecycle_value}` in space.lifecycle"
        ))
    })?;

    Ok(Space {
        id: column(row, "id")?,
        ref_id: column(row, "ref_id")?,
        name: column(row, "name")?,
        org_id: column(row, "org_id")?,
        user_id: column(row, "user_id")?,
        kind,
        lifecycle,
        likes: column(row, "likes")?,
        created: column(row, "created")?,
        revised: column(row, "revised")?,
    })
}

fn column<T: rusqlite::types::FromSql>(row: &Row<'_>, name: &str) -> SpaceRepoResult<T> {
    row.get(name)
        .map_err(|err| SpaceRepoError::InvalidData(format!("space.{name}: {err}")))
}

fn ensure_space_connection_ready(conn: &Connection) -> SpaceRepoResult<()> {
    let tag = |err: rusqlite::Error| SpaceRepoError::storage("try_new", "schema", err);
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)
        .map_err(|err| SpaceRepoError::storage("try_new", "schema", err))?;
    if actual_version != expected_version {
        return Err(SpaceRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in [
        (SPACE_TABLE, SPACE_COLUMNS),
        ("permission", PERMISSION_COLUMNS),
        ("group_member", GROUP_MEMBER_COLUMNS),
    ] {
        if !table_exists(conn, table).map_err(tag)? {
            return Err(SpaceRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column).map_err(tag)? {
                return Err(SpaceRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}
