//! Per-initiator composition of a multi-recipient message.
//!
//! ```text
//! SelectingRecipients --finish--> EnteringText --submit--> Confirming --confirm--> Completed
//!          \                          \                        \
//!           `----------------------cancel------------------------`--> Cancelled
//! ```
//!
//! A reply starts directly in `EnteringText` with the original sender as the
//! only recipient.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use relay_db::Database;
use relay_types::UserId;
use relay_types::api::{MessagePreview, SessionState, SessionView};
use relay_types::models::User;

use crate::broadcast::{BroadcastEngine, BroadcastHandle, SendRequest};
use crate::error::{RelayError, Result};
use crate::permissions::Permissions;

/// One initiator's in-flight composition.
///
/// Every transition validates before it mutates, so a failed call leaves the
/// session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    initiator: UserId,
    state: SessionState,
    /// Selection order is kept; it becomes the delivery order.
    recipients: Vec<UserId>,
    text: Option<String>,
}

impl Session {
    pub fn selecting(initiator: UserId) -> Self {
        Self {
            initiator,
            state: SessionState::SelectingRecipients,
            recipients: Vec::new(),
            text: None,
        }
    }

    pub fn replying(initiator: UserId, to: UserId) -> Self {
        Self {
            initiator,
            state: SessionState::EnteringText,
            recipients: vec![to],
            text: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn recipients(&self) -> &[UserId] {
        &self.recipients
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            recipients: self.recipients.clone(),
            text: self.text.clone(),
        }
    }

    fn require_state(&self, state: SessionState) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(RelayError::InvalidSessionState)
        }
    }

    /// Flip membership of `user_id`. Returns whether it is now selected.
    pub fn toggle(&mut self, user_id: UserId) -> Result<bool> {
        self.require_state(SessionState::SelectingRecipients)?;

        if let Some(pos) = self.recipients.iter().position(|&id| id == user_id) {
            self.recipients.remove(pos);
            Ok(false)
        } else {
            self.recipients.push(user_id);
            Ok(true)
        }
    }

    pub fn finish_selecting(&mut self) -> Result<()> {
        self.require_state(SessionState::SelectingRecipients)?;
        if self.recipients.is_empty() {
            return Err(RelayError::EmptySelection);
        }
        self.state = SessionState::EnteringText;
        Ok(())
    }

    pub fn submit_text(&mut self, text: &str) -> Result<()> {
        self.require_state(SessionState::EnteringText)?;
        if text.trim().is_empty() {
            return Err(RelayError::EmptyText);
        }
        self.text = Some(text.to_string());
        self.state = SessionState::Confirming;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<SendRequest> {
        self.require_state(SessionState::Confirming)?;
        let text = self.text.clone().ok_or(RelayError::InvalidSessionState)?;
        self.state = SessionState::Completed;
        Ok(SendRequest {
            sender_id: self.initiator,
            recipients: self.recipients.clone(),
            text,
        })
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(RelayError::InvalidSessionState);
        }
        self.state = SessionState::Cancelled;
        Ok(())
    }
}

/// Owns every live session, keyed by initiator, and drives them.
///
/// All session access goes through one lock. Sessions live in memory only and
/// are lost on restart.
pub struct Composer {
    db: Arc<Database>,
    permissions: Permissions,
    engine: Arc<BroadcastEngine>,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl Composer {
    pub fn new(db: Arc<Database>, permissions: Permissions, engine: Arc<BroadcastEngine>) -> Self {
        Self {
            db,
            permissions,
            engine,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a fresh composition, replacing any session the initiator had.
    /// Returns the candidate recipients, most recently active first.
    pub async fn start(&self, initiator: UserId) -> Result<(SessionView, Vec<User>)> {
        if !self.permissions.can_initiate_send(initiator)? {
            return Err(RelayError::PermissionDenied);
        }

        let candidates = self.db.list_active_users(Some(initiator))?;
        if candidates.is_empty() {
            return Err(RelayError::NoRecipients);
        }

        let session = Session::selecting(initiator);
        let view = session.view();
        if self.sessions.lock().await.insert(initiator, session).is_some() {
            debug!("User {} restarted composition, previous session dropped", initiator);
        }

        info!("User {} started composing ({} candidates)", initiator, candidates.len());
        Ok((view, candidates))
    }

    /// Reply shortcut: recipient fixed to `to`, straight to text entry.
    pub async fn reply(&self, initiator: UserId, to: UserId) -> Result<SessionView> {
        if !self.permissions.can_initiate_send(initiator)? {
            return Err(RelayError::PermissionDenied);
        }
        if self.db.get_user(to)?.is_none() {
            return Err(RelayError::UnknownUser(to));
        }

        let session = Session::replying(initiator, to);
        let view = session.view();
        self.sessions.lock().await.insert(initiator, session);

        info!("User {} replying to {}", initiator, to);
        Ok(view)
    }

    pub async fn toggle(&self, initiator: UserId, user_id: UserId) -> Result<SessionView> {
        self.with_session(initiator, |session| {
            session.toggle(user_id)?;
            Ok(session.view())
        })
        .await
    }

    pub async fn finish_selecting(&self, initiator: UserId) -> Result<SessionView> {
        self.with_session(initiator, |session| {
            session.finish_selecting()?;
            Ok(session.view())
        })
        .await
    }

    /// Store the draft and return what the recipients will see.
    pub async fn submit_text(&self, initiator: UserId, text: &str) -> Result<MessagePreview> {
        let sender_label = match self.db.get_user(initiator)? {
            Some(user) => user.label(),
            None => format!("ID: {}", initiator),
        };

        self.with_session(initiator, |session| {
            session.submit_text(text)?;
            Ok(MessagePreview {
                sender_label,
                text: text.to_string(),
                recipient_count: session.recipients().len(),
            })
        })
        .await
    }

    /// Hand the composition to the broadcast engine. The session is done as
    /// soon as the engine accepts; delivery finishes on the returned handle.
    ///
    /// An initiator missing from the directory is rejected here and the
    /// session stays in `Confirming`.
    pub async fn confirm(&self, initiator: UserId) -> Result<(usize, BroadcastHandle)> {
        let request = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&initiator)
                .ok_or(RelayError::InvalidSessionState)?;
            session.require_state(SessionState::Confirming)?;
            if self.db.get_user(initiator)?.is_none() {
                return Err(RelayError::UnknownSender(initiator));
            }
            let request = session.confirm()?;
            sessions.remove(&initiator);
            request
        };

        let count = request.recipients.len();
        info!("User {} confirmed a message to {} recipients", initiator, count);
        Ok((count, self.engine.spawn(request)))
    }

    pub async fn cancel(&self, initiator: UserId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&initiator)
            .ok_or(RelayError::InvalidSessionState)?;
        session.cancel()?;
        sessions.remove(&initiator);

        info!("User {} cancelled composition", initiator);
        Ok(())
    }

    pub async fn view(&self, initiator: UserId) -> Option<SessionView> {
        self.sessions.lock().await.get(&initiator).map(Session::view)
    }

    async fn with_session<F, T>(&self, initiator: UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&initiator)
            .ok_or(RelayError::InvalidSessionState)?;
        f(session)
    }
}
