//! Space domain model.
//!
//! # Responsibility
//! - Define the canonical record for a document container ("space").
//! - Validate identity and timestamp invariants before persistence.
//!
//! # Invariants
//! - `ref_id` is caller-assigned, stable and never reused inside one org.
//! - `org_id` scopes every read and write of the record.
//! - `revised` is never earlier than `created`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Upper bound for externally supplied reference ids.
pub const MAX_REF_ID_LEN: usize = 64;

static REF_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid ref id regex"));

/// Visibility classification of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    /// Visible to everyone in the organization.
    Public,
    /// Visible to explicitly granted users and roles.
    Private,
    /// Private space with restricted sharing.
    Restricted,
}

impl SpaceType {
    /// Stored discriminant. `1` is the public marker used by listings.
    pub fn to_db(self) -> i64 {
        match self {
            Self::Public => 1,
            Self::Private => 2,
            Self::Restricted => 3,
        }
    }

    /// Decodes a stored discriminant. Legacy rows store private spaces as
    /// `0`; they read back as `Private` and are rewritten as `2` on update.
    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Public),
            0 | 2 => Some(Self::Private),
            3 => Some(Self::Restricted),
            _ => None,
        }
    }
}

/// Lifecycle status of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceLifecycle {
    Draft,
    Live,
    Archived,
}

impl SpaceLifecycle {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Draft => 0,
            Self::Live => 1,
            Self::Archived => 2,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Draft),
            1 => Some(Self::Live),
            2 => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Validation failures for `Space` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceValidationError {
    EmptyRefId,
    /// Reference id contains characters outside `[A-Za-z0-9_-]` or is too long.
    InvalidRefId(String),
    EmptyOrgId,
    EmptyName,
    /// Owner is blank on a record that is being updated.
    EmptyOwner,
    NegativeLikes(i64),
    RevisedBeforeCreated { created: i64, revised: i64 },
}

impl Display for SpaceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRefId => write!(f, "space ref_id must not be blank"),
            Self::InvalidRefId(value) => write!(
                f,
                "space ref_id `{value}` must match [A-Za-z0-9_-] and be at most {MAX_REF_ID_LEN} chars"
            ),
            Self::EmptyOrgId => write!(f, "space org_id must not be blank"),
            Self::EmptyName => write!(f, "space name must not be blank"),
            Self::EmptyOwner => write!(f, "space user_id must not be blank"),
            Self::NegativeLikes(value) => write!(f, "space likes must be >= 0, got {value}"),
            Self::RevisedBeforeCreated { created, revised } => write!(
                f,
                "space revised ({revised}) must be >= created ({created})"
            ),
        }
    }
}

impl Error for SpaceValidationError {}

/// Canonical domain record for one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Internal surrogate key assigned by storage. `0` before insert.
    pub id: i64,
    /// External-facing unique key within the organization.
    pub ref_id: String,
    pub name: String,
    pub org_id: String,
    /// Owning user. Reassignable on update.
    pub user_id: String,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: SpaceType,
    pub lifecycle: SpaceLifecycle,
    pub likes: i64,
    /// UTC epoch milliseconds, set once at insert.
    pub created: i64,
    /// UTC epoch milliseconds, refreshed on every mutation.
    pub revised: i64,
}

impl Space {
    /// Creates a new live space with a generated reference id.
    pub fn new(org_id: impl Into<String>, name: impl Into<String>, kind: SpaceType) -> Self {
        Self::unchecked(Uuid::new_v4().simple().to_string(), org_id, name, kind)
    }

    /// Creates a new live space with a caller-provided reference id.
    ///
    /// Used by import paths where the external identity already exists.
    ///
    /// # Errors
    /// - Returns `SpaceValidationError` when the resulting record is invalid.
    pub fn with_ref_id(
        ref_id: impl Into<String>,
        org_id: impl Into<String>,
        name: impl Into<String>,
        kind: SpaceType,
    ) -> Result<Self, SpaceValidationError> {
        let space = Self::unchecked(ref_id.into(), org_id, name, kind);
        space.validate()?;
        Ok(space)
    }

    fn unchecked(
        ref_id: String,
        org_id: impl Into<String>,
        name: impl Into<String>,
        kind: SpaceType,
    ) -> Self {
        Self {
            id: 0,
            ref_id,
            name: name.into(),
            org_id: org_id.into(),
            user_id: String::new(),
            kind,
            lifecycle: SpaceLifecycle::Live,
            likes: 0,
            created: 0,
            revised: 0,
        }
    }

    /// Returns whether anyone in the organization may see this space.
    pub fn is_public(&self) -> bool {
        self.kind == SpaceType::Public
    }

    /// Checks record invariants.
    ///
    /// The owner is not checked here because storage stamps it from the
    /// request context on insert; `validate_owned` adds that check.
    pub fn validate(&self) -> Result<(), SpaceValidationError> {
        if self.ref_id.trim().is_empty() {
            return Err(SpaceValidationError::EmptyRefId);
        }
        if self.ref_id.len() > MAX_REF_ID_LEN || !REF_ID_RE.is_match(&self.ref_id) {
            return Err(SpaceValidationError::InvalidRefId(self.ref_id.clone()));
        }
        if self.org_id.trim().is_empty() {
            return Err(SpaceValidationError::EmptyOrgId);
        }
        if self.name.trim().is_empty() {
            return Err(SpaceValidationError::EmptyName);
        }
        if self.likes < 0 {
            return Err(SpaceValidationError::NegativeLikes(self.likes));
        }
        if self.revised < self.created {
            return Err(SpaceValidationError::RevisedBeforeCreated {
                created: self.created,
                revised: self.revised,
            });
        }
        Ok(())
    }

    /// `validate` plus a non-blank owner. Used by update paths, where the
    /// owner comes from the caller instead of the request context.
    pub fn validate_owned(&self) -> Result<(), SpaceValidationError> {
        self.validate()?;
        if self.user_id.trim().is_empty() {
            return Err(SpaceValidationError::EmptyOwner);
        }
        Ok(())
    }
}

/// Current UTC wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
