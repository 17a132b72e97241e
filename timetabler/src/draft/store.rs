/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Persistence seam for draft timetables.
//!
//! The engine never talks to a database itself.  [`TimetableStore`] is the
//! contract a persistence layer must honour; the only hard requirement is
//! that [`insert_version`](TimetableStore::insert_version) is an atomic
//! compare-and-swap on the key's latest version.
//!
//! [`InMemoryStore`] implements the contract behind a single [`Mutex`] and can
//! be snapshotted to YAML so the CLI keeps drafts between invocations.
//!
//! The expected snapshot layout is:
//! ```yaml
//! timetables:
//!   - id: cs-1a/2026-fall/v1
//!     key: { group_id: cs-1a, academic_term_id: 2026-fall }
//!     status: draft
//!     version: 1
//!     sessions: [...]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DraftError, DraftKey, Timetable, TimetableStatus};
use crate::course::Session;

// ── Contract ──────────────────────────────────────────────────────────────────

/// Storage for timetable versions, shared by concurrent generation runs.
pub trait TimetableStore: Send + Sync {
    /// All versions for `key`, oldest first.
    fn versions(&self, key: &DraftKey) -> Vec<Timetable>;

    /// Look a timetable up by id.
    fn get(&self, id: &str) -> Option<Timetable>;

    /// Append `timetable` as the newest version of its key, but only if the
    /// key's latest version is still `expected_latest`.  Drafts it supersedes
    /// are archived in the same critical section.
    fn insert_version(
        &self,
        timetable: Timetable,
        expected_latest: Option<u32>,
    ) -> Result<(), DraftError>;

    /// Mark a draft as published and archive the key's previous publication.
    fn publish(&self, id: &str) -> Result<Timetable, DraftError>;

    /// Set the `locked` flag of session `index` of draft `id` and return the
    /// updated session.  Only drafts may be edited.
    fn set_locked(&self, id: &str, index: usize, locked: bool) -> Result<Session, DraftError>;

    /// Highest version for `key`, any status.
    fn latest(&self, key: &DraftKey) -> Option<Timetable> {
        self.versions(key).into_iter().max_by_key(|t| t.version)
    }

    /// Highest-version draft for `key`.
    fn latest_draft(&self, key: &DraftKey) -> Option<Timetable> {
        self.versions(key)
            .into_iter()
            .filter(|t| t.status == TimetableStatus::Draft)
            .max_by_key(|t| t.version)
    }
}

// ── In-memory implementation ──────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    timetables: Vec<Timetable>,
}

/// Mutex-guarded map of key → versions (ascending).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<DraftKey, Vec<Timetable>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic in another holder cannot leave the map half-updated (every
    /// mutation is a single push or field write), so a poisoned lock is
    /// still safe to use.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<DraftKey, Vec<Timetable>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored timetables across all keys.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a YAML snapshot written by [`save_snapshot`](Self::save_snapshot).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        info!("Loading draft snapshot from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open snapshot file: {}", path.display()))?;
        let snapshot: Snapshot = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))?;

        let mut map: BTreeMap<DraftKey, Vec<Timetable>> = BTreeMap::new();
        for tt in snapshot.timetables {
            map.entry(tt.key.clone()).or_default().push(tt);
        }
        for versions in map.values_mut() {
            versions.sort_by_key(|t| t.version);
        }

        let store = Self {
            inner: Mutex::new(map),
        };
        info!("Loaded {} timetable(s) from snapshot", store.len());
        Ok(store)
    }

    /// Write every stored timetable to `path` as YAML.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            timetables: self.lock().values().flatten().cloned().collect(),
        };
        let yaml = serde_yaml::to_string(&snapshot).context("Failed to serialise snapshot")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Cannot write snapshot file: {}", path.display()))?;
        info!(
            "Saved {} timetable(s) to {}",
            snapshot.timetables.len(),
            path.display()
        );
        Ok(())
    }
}

impl TimetableStore for InMemoryStore {
    fn versions(&self, key: &DraftKey) -> Vec<Timetable> {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    fn get(&self, id: &str) -> Option<Timetable> {
        self.lock().values().flatten().find(|t| t.id == id).cloned()
    }

    fn insert_version(
        &self,
        timetable: Timetable,
        expected_latest: Option<u32>,
    ) -> Result<(), DraftError> {
        let mut map = self.lock();
        let versions = map.entry(timetable.key.clone()).or_default();

        let found = versions.iter().map(|t| t.version).max();
        if found != expected_latest {
            return Err(DraftError::ConcurrencyConflict {
                key: timetable.key,
                expected: expected_latest,
                found,
            });
        }

        for old in versions
            .iter_mut()
            .filter(|t| t.status == TimetableStatus::Draft)
        {
            debug!(id = %old.id, "superseded draft archived");
            old.status = TimetableStatus::Archived;
        }

        versions.push(timetable);
        Ok(())
    }

    fn publish(&self, id: &str) -> Result<Timetable, DraftError> {
        let mut map = self.lock();
        let versions = map
            .values_mut()
            .find(|v| v.iter().any(|t| t.id == id))
            .ok_or_else(|| DraftError::NotFound(id.to_string()))?;

        let idx = versions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| DraftError::NotFound(id.to_string()))?;

        let status = versions[idx].status;
        if status != TimetableStatus::Draft {
            return Err(DraftError::NotDraft {
                id: id.to_string(),
                status,
            });
        }

        for t in versions
            .iter_mut()
            .filter(|t| t.status == TimetableStatus::Published)
        {
            debug!(id = %t.id, "previous publication archived");
            t.status = TimetableStatus::Archived;
        }

        versions[idx].status = TimetableStatus::Published;
        Ok(versions[idx].clone())
    }

    fn set_locked(&self, id: &str, index: usize, locked: bool) -> Result<Session, DraftError> {
        let mut map = self.lock();
        let tt = map
            .values_mut()
            .flatten()
            .find(|t| t.id == id)
            .ok_or_else(|| DraftError::NotFound(id.to_string()))?;

        if tt.status != TimetableStatus::Draft {
            return Err(DraftError::NotDraft {
                id: id.to_string(),
                status: tt.status,
            });
        }

        let len = tt.sessions.len();
        let session = tt
            .sessions
            .get_mut(index)
            .ok_or_else(|| DraftError::NoSuchSession {
                id: id.to_string(),
                index,
                len,
            })?;
        session.locked = locked;
        Ok(session.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
