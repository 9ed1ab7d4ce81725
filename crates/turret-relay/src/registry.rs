//! Routing table of live sessions.
//!
//! At most one rig and any number of operators. Every entry owns the
//! sending half of that session's outbound queue. Sends never block.
//! An operator whose queue is full or closed has failed delivery and is
//! removed; its writer task then sees the closed channel and ends the
//! connection. The rig's queue only carries control frames, so a full
//! rig queue drops the frame and the next one supersedes it.

use std::collections::BTreeMap;

use axum::body::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use turret_core::config::RigPolicy;

use crate::error::RelayError;
use crate::session::{Outbound, SessionId, SessionRole};

/// The registry's view of one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Session id.
    pub id: SessionId,
    /// Session role.
    pub role: SessionRole,
    /// Sender into the session's writer task.
    pub tx: mpsc::Sender<Outbound>,
}

impl SessionHandle {
    /// Handle for a newly accepted session.
    pub const fn new(id: SessionId, role: SessionRole, tx: mpsc::Sender<Outbound>) -> Self {
        Self { id, role, tx }
    }
}

/// Result of a successful registration.
#[derive(Debug)]
pub enum Admission {
    /// Registered with no side effects.
    Admitted,
    /// Registered a rig by evicting the previous one, returned here.
    Superseded(SessionHandle),
}

/// Outcome of a fan-out to every operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Operators whose queue accepted the frame.
    pub delivered: usize,
    /// Operators whose queue was full or closed; they were unregistered.
    pub removed: Vec<SessionId>,
}

/// Live sessions by role.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    rig: Option<SessionHandle>,
    operators: BTreeMap<SessionId, SessionHandle>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. A second rig is handled per `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionConflict`] when a rig is already
    /// registered and `policy` is [`RigPolicy::Reject`].
    pub fn register(
        &mut self,
        handle: SessionHandle,
        policy: RigPolicy,
    ) -> Result<Admission, RelayError> {
        match handle.role {
            SessionRole::Operator => {
                self.operators.insert(handle.id, handle);
                Ok(Admission::Admitted)
            }
            SessionRole::Rig => match (self.rig.take(), policy) {
                (None, _) => {
                    self.rig = Some(handle);
                    Ok(Admission::Admitted)
                }
                (Some(existing), RigPolicy::Reject) => {
                    self.rig = Some(existing);
                    Err(RelayError::SessionConflict)
                }
                (Some(existing), RigPolicy::Supersede) => {
                    info!(old = %existing.id, new = %handle.id, "Rig superseded");
                    self.rig = Some(handle);
                    Ok(Admission::Superseded(existing))
                }
            },
        }
    }

    /// Remove a session by id. The rig slot is only cleared if `id` still
    /// owns it.
    pub fn unregister(&mut self, id: SessionId) -> Option<SessionHandle> {
        if self.rig.as_ref().is_some_and(|rig| rig.id == id) {
            return self.rig.take();
        }
        self.operators.remove(&id)
    }

    /// Whether a rig is registered.
    pub const fn rig_connected(&self) -> bool {
        self.rig.is_some()
    }

    /// Id of the registered rig.
    pub fn rig_id(&self) -> Option<SessionId> {
        self.rig.as_ref().map(|rig| rig.id)
    }

    /// Number of registered operators.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Queue a binary frame for every operator.
    pub fn fan_out(&mut self, frame: &Bytes) -> FanOutReport {
        self.fan_out_with(|| Outbound::Binary(frame.clone()))
    }

    /// Queue a text frame for every operator.
    pub fn broadcast_text(&mut self, text: &str) -> FanOutReport {
        self.fan_out_with(|| Outbound::Text(text.to_owned()))
    }

    /// Queue a frame for the rig.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NoRig`] if no rig is registered,
    /// [`RelayError::RigBusy`] if the rig's queue is full (the frame is
    /// dropped, the rig stays registered), or
    /// [`RelayError::UnroutableDelivery`] if the rig's queue is closed (the
    /// rig is unregistered).
    pub fn send_to_rig(&mut self, message: Outbound) -> Result<(), RelayError> {
        let rig = self.rig.as_ref().ok_or(RelayError::NoRig)?;
        match rig.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RelayError::RigBusy),
            Err(TrySendError::Closed(_)) => {
                let session = rig.id;
                self.rig = None;
                Err(RelayError::UnroutableDelivery { session })
            }
        }
    }

    /// Queue a frame for one operator.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnroutableDelivery`] if the operator is unknown
    /// or its queue is full or closed (it is unregistered).
    pub fn send_to(&mut self, id: SessionId, message: Outbound) -> Result<(), RelayError> {
        let handle = self
            .operators
            .get(&id)
            .ok_or(RelayError::UnroutableDelivery { session: id })?;
        if let Err(e) = handle.tx.try_send(message) {
            self.operators.remove(&id);
            warn!(session = %id, reason = send_failure(&e), "Operator unreachable, session removed");
            return Err(RelayError::UnroutableDelivery { session: id });
        }
        Ok(())
    }

    fn fan_out_with(&mut self, mut make: impl FnMut() -> Outbound) -> FanOutReport {
        let mut report = FanOutReport::default();
        for (id, handle) in &self.operators {
            match handle.tx.try_send(make()) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    warn!(session = %id, reason = send_failure(&e), "Operator unreachable, session removed");
                    report.removed.push(*id);
                }
            }
        }
        for id in &report.removed {
            self.operators.remove(id);
        }
        report
    }
}

const fn send_failure<T>(error: &TrySendError<T>) -> &'static str {
    match error {
        TrySendError::Full(_) => "queue full",
        TrySendError::Closed(_) => "queue closed",
    }
}
