//! Versioned draft timetables.
//!
//! Every `(group_id, academic_term_id)` key owns a sequence of
//! [`Timetable`] versions.  [`DraftManager`] decides whether a generation run
//! may go ahead and commits its result as the next version.
//!
//! # State machine (per key)
//!
//! | Latest draft | `force_regenerate` | Outcome |
//! |---|---|---|
//! | none | any | proceed, version = latest version + 1 (1 for a new key) |
//! | exists | `false` | [`DraftError::AlreadyExists`]; nothing changes |
//! | exists | `true` | proceed, version = latest + 1; old draft archived on commit |
//!
//! The version check and the insert are split across the (possibly long)
//! planning run.  [`DraftManager::commit`] therefore re-checks the latest
//! version inside the store's critical section and fails with
//! [`DraftError::ConcurrencyConflict`] if another run got there first.

pub mod store;

pub use store::{InMemoryStore, TimetableStore};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::course::Session;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Key under which draft versions are counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftKey {
    pub group_id: String,
    pub academic_term_id: String,
}

impl DraftKey {
    pub fn new(group_id: impl Into<String>, academic_term_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            academic_term_id: academic_term_id.into(),
        }
    }

    /// Deterministic timetable id for `version` of this key.
    pub fn timetable_id(&self, version: u32) -> String {
        format!("{}/{}/v{}", self.group_id, self.academic_term_id, version)
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group_id, self.academic_term_id)
    }
}

// ── Timetable record ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimetableStatus {
    #[default]
    Draft,
    Published,
    /// Superseded by a newer draft or by a newer publication.
    Archived,
}

impl std::fmt::Display for TimetableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimetableStatus::Draft => "draft",
            TimetableStatus::Published => "published",
            TimetableStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// One version of a group's timetable for a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub id: String,
    pub key: DraftKey,
    pub status: TimetableStatus,
    pub version: u32,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Timetable {
    pub fn locked_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.locked)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// A draft exists and regeneration was not forced.  Expected business
    /// outcome, not a failure.
    #[error("Timetable already exists. Use force_regenerate=true to recreate.")]
    AlreadyExists { key: DraftKey, version: u32 },

    /// Another run committed a version for the same key between
    /// [`DraftManager::prepare`] and [`DraftManager::commit`].  Retryable.
    #[error(
        "concurrent generation for {key}: expected latest version {expected:?}, found {found:?}"
    )]
    ConcurrencyConflict {
        key: DraftKey,
        expected: Option<u32>,
        found: Option<u32>,
    },

    #[error("timetable '{0}' not found")]
    NotFound(String),

    #[error("timetable '{id}' is {status}, only drafts can be published or edited")]
    NotDraft { id: String, status: TimetableStatus },

    #[error("timetable '{id}' has no session #{index} ({len} session(s))")]
    NoSuchSession { id: String, index: usize, len: usize },
}

// ── Draft manager ─────────────────────────────────────────────────────────────

/// Permission to generate one version, handed out by
/// [`DraftManager::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct DraftTicket {
    pub key: DraftKey,
    /// Version the committed timetable will carry.
    pub version: u32,
    /// Latest version seen at prepare time; `None` for a new key.
    pub expected_latest: Option<u32>,
    /// Locked sessions of the previous version to pre-occupy and re-emit.
    pub locked: Vec<Session>,
}

/// Go/no-go decisions and version commits for draft timetables.
pub struct DraftManager<S: TimetableStore> {
    store: Arc<S>,
}

impl<S: TimetableStore> Clone for DraftManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: TimetableStore> DraftManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decide whether a run for `key` may proceed.
    ///
    /// # Errors
    /// [`DraftError::AlreadyExists`] when a draft exists and
    /// `force_regenerate` is `false`.
    pub fn prepare(
        &self,
        key: &DraftKey,
        force_regenerate: bool,
        preserve_locked: bool,
    ) -> Result<DraftTicket, DraftError> {
        if let Some(draft) = self.store.latest_draft(key) {
            if !force_regenerate {
                info!(
                    key = %key,
                    version = draft.version,
                    "draft already exists and regeneration was not forced"
                );
                return Err(DraftError::AlreadyExists {
                    key: key.clone(),
                    version: draft.version,
                });
            }
        }

        let latest = self.store.latest(key);
        let expected_latest = latest.as_ref().map(|t| t.version);
        let version = expected_latest.map_or(1, |v| v + 1);

        let locked: Vec<Session> = match (&latest, preserve_locked) {
            (Some(prev), true) => prev.locked_sessions().cloned().collect(),
            _ => Vec::new(),
        };

        debug!(
            key = %key,
            version,
            expected_latest = ?expected_latest,
            locked = locked.len(),
            "draft ticket issued"
        );

        Ok(DraftTicket {
            key: key.clone(),
            version,
            expected_latest,
            locked,
        })
    }

    /// Store `sessions` as the ticket's version.
    ///
    /// # Errors
    /// [`DraftError::ConcurrencyConflict`] if the key's latest version changed
    /// since [`prepare`](Self::prepare).
    pub fn commit(&self, ticket: DraftTicket, sessions: Vec<Session>) -> Result<Timetable, DraftError> {
        let timetable = Timetable {
            id: ticket.key.timetable_id(ticket.version),
            key: ticket.key,
            status: TimetableStatus::Draft,
            version: ticket.version,
            sessions,
        };

        self.store
            .insert_version(timetable.clone(), ticket.expected_latest)?;

        info!(
            id = %timetable.id,
            version = timetable.version,
            sessions = timetable.sessions.len(),
            "draft committed"
        );
        Ok(timetable)
    }

    /// Lock or unlock session `index` of draft `id`.  Locked sessions are
    /// carried into the next version when it is generated with
    /// `preserve_locked`.
    ///
    /// # Errors
    /// [`DraftError::NotFound`], [`DraftError::NotDraft`] for published or
    /// archived timetables, [`DraftError::NoSuchSession`] for a bad index.
    pub fn set_locked(&self, id: &str, index: usize, locked: bool) -> Result<Session, DraftError> {
        let session = self.store.set_locked(id, index, locked)?;
        info!(
            id,
            index,
            locked,
            course = %session.course_id,
            day = session.day_of_week,
            start = session.period_start_index,
            "session lock changed"
        );
        Ok(session)
    }

    /// Publish a draft; the previously published version of its key, if any,
    /// is archived.
    pub fn publish(&self, id: &str) -> Result<Timetable, DraftError> {
        let published = self.store.publish(id)?;
        info!(id = %published.id, version = published.version, "timetable published");
        Ok(published)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
