//! The directory of connected agents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use oef_core::query::QueryModel;
use tracing::debug;

use crate::session::AgentSession;

/// The live session table, keyed by agent public key.
///
/// Sessions are shared handles: the directory is one owner, and a handler
/// forwarding a message to a session temporarily holds another. Removing
/// an entry severs the directory's ownership; the session's socket is torn
/// down once the last handle drops.
///
/// All operations are linearizable under the one directory-wide mutex,
/// which is held only for the body of the call and never across I/O.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    sessions: Mutex<HashMap<String, Arc<AgentSession>>>,
}

impl AgentDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `session` under `id`.
    ///
    /// Returns `false`, leaving the table untouched, if `id` is
    /// already connected. This is the only place at-most-one-connection-
    /// per-identity is enforced.
    pub fn add(&self, id: &str, session: Arc<AgentSession>) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(id) {
            return false;
        }
        sessions.insert(id.to_owned(), session);
        true
    }

    /// Removes the session registered under `id`.
    ///
    /// Returns `true` iff a session was removed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().unwrap().remove(id).is_some();
        if removed {
            debug!(agent = id, "removed agent session");
        }
        removed
    }

    /// Whether `id` is currently connected.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(id)
    }

    /// A shared handle to the session registered under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<AgentSession>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Removes every session.
    pub fn clear(&self) {
        self.sessions.lock().unwrap().clear();
    }

    /// Number of connected agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether no agent is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities of every connected agent whose registered description
    /// satisfies `query`. Agents without a description never match.
    #[must_use]
    pub fn search(&self, query: &QueryModel) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .filter(|(_, session)| session.matches(query))
            .map(|(id, _)| id.clone())
            .collect()
    }
}
