//! The process-wide session registry.
//!
//! Maps session ids to live [`Session`]s. Creation is atomic with respect to
//! concurrent creates of the same id; listings take a snapshot so callers can
//! iterate as often as they like without holding the registry lock.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use transmission_core::broadcast::Scope;
use transmission_core::error::DomainError;
use transmission_core::ids::SessionId;

use super::config::MatchConfig;
use super::services::MatchServices;
use super::session::Session;
use crate::domain::events::{MatchEvent, SessionSummary};

/// Snapshot of the sessions that were open when it was taken.
///
/// Iteration re-checks each session, so a session that filled up or started
/// after the snapshot is skipped. The snapshot can be iterated any number of
/// times.
#[derive(Debug, Clone)]
pub struct OpenSessions {
    sessions: Vec<Arc<Session>>,
}

impl OpenSessions {
    /// Iterates the sessions that are still open.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.iter().filter(|session| session.is_open())
    }

    /// Listing entries for the sessions that are still open.
    #[must_use]
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.iter().map(|session| session.summary()).collect()
    }
}

impl<'a> IntoIterator for &'a OpenSessions {
    type Item = &'a Arc<Session>;
    type IntoIter = Box<dyn Iterator<Item = &'a Arc<Session>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Owns every live session.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, Arc<Session>>>,
    config: MatchConfig,
    services: MatchServices,
}

impl SessionRegistry {
    /// Creates an empty registry whose sessions all use `config`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `config` is not usable.
    pub fn new(config: MatchConfig, services: MatchServices) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            sessions: RwLock::new(BTreeMap::new()),
            config,
            services,
        })
    }

    /// Registers a new, empty session under `id`.
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation` if `id` is empty.
    /// - `DomainError::DuplicateId` if `id` is already registered; the existing
    ///   session is left untouched.
    pub fn create(&self, id: SessionId) -> Result<Arc<Session>, DomainError> {
        if id.as_str().trim().is_empty() {
            return Err(DomainError::Validation(
                "session id must not be empty".to_owned(),
            ));
        }
        let mut sessions = self.write();
        match sessions.entry(id) {
            Entry::Occupied(entry) => Err(DomainError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::new(
                    entry.key().clone(),
                    self.config.clone(),
                    self.services.clone(),
                ));
                info!(session_id = %entry.key(), "session created");
                Ok(Arc::clone(entry.insert(session)))
            }
        }
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no session has that id.
    pub fn get(&self, id: &SessionId) -> Result<Arc<Session>, DomainError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(id.clone()))
    }

    /// Snapshot of the sessions currently accepting joins, in id order.
    #[must_use]
    pub fn list_open(&self) -> OpenSessions {
        let sessions = self
            .read()
            .values()
            .filter(|session| session.is_open())
            .cloned()
            .collect();
        OpenSessions { sessions }
    }

    /// Listing entries for every registered session, in id order.
    #[must_use]
    pub fn list_all(&self) -> Vec<SessionSummary> {
        self.read().values().map(|session| session.summary()).collect()
    }

    /// Number of registered sessions, ended ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Tells every connection which sessions are open now.
    pub fn announce_open_sessions(&self) {
        let event = MatchEvent::SessionListChanged(self.list_open().summaries());
        self.services
            .broadcaster
            .send_to_scope(&Scope::All, event.name(), event.payload());
    }

    /// Removes sessions that ended before `cutoff`. Returns how many went.
    pub fn prune_ended(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.is_ended() && session.ended_at().is_some_and(|at| at < cutoff);
            if expired {
                debug!(session_id = %id, "evicting ended session");
            }
            !expired
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "pruned ended sessions");
        }
        removed
    }

    /// Removes sessions created before `cutoff` whose pipeline never started,
    /// so lobbies nobody fills do not pile up. Returns how many went.
    pub fn prune_abandoned(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let abandoned = !session.is_started() && session.created_at() < cutoff;
            if abandoned {
                debug!(session_id = %id, "evicting abandoned session");
            }
            !abandoned
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "pruned abandoned sessions");
        }
        removed
    }

    /// Aborts every running pipeline. Sessions stay registered.
    pub fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self.read().values().cloned().collect();
        let mut aborted = 0_usize;
        for session in sessions {
            if let Some(handle) = session.take_pipeline() {
                handle.abort();
                aborted += 1;
            }
        }
        info!(aborted, "session registry shut down");
    }

    /// Shared collaborators, for callers that need the clock.
    #[must_use]
    pub fn services(&self) -> &MatchServices {
        &self.services
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
