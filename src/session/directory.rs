//! Session directory mapping participants to running sessions
//!
//! The directory owns the only long-lived handles to sessions. Sessions hold
//! a [`WeakDirectory`] so they can deregister themselves without keeping the
//! directory alive.

use crate::error::{DebateError, Result};
use crate::session::instance::{Session, SessionContext, SessionHandle, SessionSetup};
use crate::types::{ParticipantId, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct DirectoryState {
    sessions: HashMap<SessionId, SessionHandle>,
    by_participant: HashMap<ParticipantId, SessionId>,
}

impl DirectoryState {
    fn remove(&mut self, session_id: SessionId) -> bool {
        let Some(handle) = self.sessions.remove(&session_id) else {
            return false;
        };
        for participant_id in handle.participants() {
            // Only drop mappings that still point at this session
            if self.by_participant.get(participant_id) == Some(&session_id) {
                self.by_participant.remove(participant_id);
            }
        }
        true
    }
}

/// Registry of active sessions
#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

/// Non-owning link from a session back to its directory
#[derive(Debug, Clone, Default)]
pub struct WeakDirectory {
    state: Weak<RwLock<DirectoryState>>,
}

impl WeakDirectory {
    /// Remove a session if the directory still exists
    pub fn deregister(&self, session_id: SessionId) -> bool {
        match self.state.upgrade() {
            Some(state) => match state.write() {
                Ok(mut state) => state.remove(session_id),
                Err(_) => {
                    warn!("Directory lock poisoned, could not deregister {}", session_id);
                    false
                }
            },
            None => false,
        }
    }
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakDirectory {
        WeakDirectory {
            state: Arc::downgrade(&self.state),
        }
    }

    fn lock_error() -> DebateError {
        DebateError::InternalError {
            message: "Failed to acquire session directory lock".to_string(),
        }
    }

    /// Build a session, register it and spawn its driver task
    pub fn start_session(
        &self,
        setup: SessionSetup,
        context: SessionContext,
    ) -> Result<SessionHandle> {
        let (session, handle) = Session::new(setup, context, self.downgrade());
        self.register(handle.clone())?;
        tokio::spawn(session.run());
        Ok(handle)
    }

    /// Register a session handle. Fails if the id or either participant is taken.
    pub fn register(&self, handle: SessionHandle) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;

        if state.sessions.contains_key(&handle.session_id()) {
            return Err(DebateError::SessionAlreadyActive {
                session_id: handle.session_id().to_string(),
            }
            .into());
        }
        for participant_id in handle.participants() {
            if state.by_participant.contains_key(participant_id) {
                return Err(DebateError::ParticipantAlreadyInSession {
                    participant_id: participant_id.clone(),
                }
                .into());
            }
        }

        for participant_id in handle.participants() {
            state
                .by_participant
                .insert(participant_id.clone(), handle.session_id());
        }
        info!(
            "Registered session {} for {:?}",
            handle.session_id(),
            handle.participants()
        );
        state.sessions.insert(handle.session_id(), handle);
        Ok(())
    }

    /// Remove a session and its participant mappings
    pub fn deregister(&self, session_id: SessionId) -> bool {
        self.state
            .write()
            .map(|mut state| state.remove(session_id))
            .unwrap_or(false)
    }

    pub fn lookup_by_participant(&self, participant_id: &str) -> Option<SessionHandle> {
        let state = self.state.read().ok()?;
        let session_id = state.by_participant.get(participant_id)?;
        state.sessions.get(session_id).cloned()
    }

    pub fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.state.read().ok()?.sessions.get(&session_id).cloned()
    }

    pub fn contains_participant(&self, participant_id: &str) -> bool {
        self.state
            .read()
            .map(|state| state.by_participant.contains_key(participant_id))
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.sessions.len())
            .unwrap_or(0)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.state
            .read()
            .map(|state| state.sessions.keys().copied().collect())
            .unwrap_or_default()
    }

    fn require_session(&self, participant_id: &str) -> Result<SessionHandle> {
        if participant_id.trim().is_empty() {
            return Err(DebateError::MissingIdentity.into());
        }
        self.lookup_by_participant(participant_id).ok_or_else(|| {
            DebateError::NotInSession {
                participant_id: participant_id.to_string(),
            }
            .into()
        })
    }

    /// Forward a submission to the participant's session
    pub async fn route_message(&self, participant_id: &str, content: &str) -> Result<()> {
        let handle = self.require_session(participant_id)?;
        debug!(
            "Routing message from '{}' to session {}",
            participant_id,
            handle.session_id()
        );
        handle.submit_message(participant_id, content).await
    }

    /// Forward a readiness signal to the participant's session
    pub fn route_readiness(&self, participant_id: &str) -> Result<()> {
        let handle = self.require_session(participant_id)?;
        handle.signal_ready(participant_id)
    }

    /// Report a lost connection to the participant's session, if any.
    /// Returns whether a session was notified.
    pub fn route_disconnect(&self, participant_id: &str) -> bool {
        match self.lookup_by_participant(participant_id) {
            Some(handle) => handle.report_disconnect(participant_id).is_ok(),
            None => false,
        }
    }
}
