//! Registry of live publish sessions.

use std::collections::HashMap;

use castline_encoder::SourceMetadata;
use castline_ipc::{Rendition, SessionId, StreamPath};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::state::SessionResources;

/// Immutable description of a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub path: StreamPath,
    pub source: SourceMetadata,
    pub renditions: Vec<Rendition>,
    pub started_at: DateTime<Utc>,
    /// Arrival order of the start request; later publishes win a path.
    pub generation: u64,
}

/// A registered session and the resources it owns.
///
/// Resources are detached before removal so they can be released while the
/// entry is still visible.
#[derive(Debug)]
pub struct PublishSession {
    info: SessionInfo,
    resources: Option<SessionResources>,
}

impl PublishSession {
    pub fn new(info: SessionInfo, resources: SessionResources) -> Self {
        Self {
            info,
            resources: Some(resources),
        }
    }

    /// Split into description and resources (if not already detached).
    pub fn into_parts(self) -> (SessionInfo, Option<SessionResources>) {
        (self.info, self.resources)
    }

    #[cfg(test)]
    pub(crate) fn without_resources(info: SessionInfo) -> Self {
        Self {
            info,
            resources: None,
        }
    }
}

/// Thread-safe map from session id to live session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, PublishSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session.
    ///
    /// At most one session owns a path. An older session on the same path is
    /// removed and returned so the caller can tear it down. If the path is
    /// held by a newer session, nothing changes and `session` is handed back
    /// as the error.
    pub fn register(&self, session: PublishSession) -> Result<Option<PublishSession>, PublishSession> {
        let mut sessions = self.sessions.write();
        let holder = sessions
            .values()
            .find(|s| s.info.path == session.info.path && s.info.id != session.info.id)
            .map(|s| (s.info.id.clone(), s.info.generation));

        let displaced = match holder {
            Some((_, generation)) if generation > session.info.generation => return Err(session),
            Some((id, _)) => sessions.remove(&id),
            None => None,
        };
        sessions.insert(session.info.id.clone(), session);
        Ok(displaced)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn lookup(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(|s| s.info.clone())
    }

    /// The session publishing `path`, if any.
    pub fn session_for_path(&self, path: &StreamPath) -> Option<SessionInfo> {
        self.sessions
            .read()
            .values()
            .find(|s| &s.info.path == path)
            .map(|s| s.info.clone())
    }

    /// Take a session's resources, leaving the entry in place.
    ///
    /// Returns `None` for unknown sessions and for sessions already being
    /// torn down.
    pub fn detach_resources(&self, id: &SessionId) -> Option<SessionResources> {
        self.sessions.write().get_mut(id)?.resources.take()
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.write().remove(id).map(|s| s.info)
    }

    /// Copy of every live session, in no particular order.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.sessions.read().values().map(|s| s.info.clone()).collect()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
