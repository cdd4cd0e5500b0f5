use relay_types::UserId;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors surfaced by core operations. Every variant except `Store` is a
/// recoverable, user-facing condition.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("you are not allowed to send messages")]
    PermissionDenied,

    #[error("this action is not valid right now")]
    InvalidSessionState,

    #[error("select at least one recipient")]
    EmptySelection,

    #[error("message text must not be empty")]
    EmptyText,

    #[error("there are no other users to send to")]
    NoRecipients,

    #[error("sender {0} is not a known user")]
    UnknownSender(UserId),

    #[error("user {0} not found")]
    UnknownUser(UserId),

    #[error("the owner cannot be the subject of this action")]
    InvalidSubject,

    #[error("user {0} is already an admin")]
    AlreadyGranted(UserId),

    #[error("user {0} is not an admin")]
    NotGranted(UserId),

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl RelayError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::InvalidSessionState => "invalid_session_state",
            Self::EmptySelection => "empty_selection",
            Self::EmptyText => "empty_text",
            Self::NoRecipients => "no_recipients",
            Self::UnknownSender(_) => "unknown_sender",
            Self::UnknownUser(_) => "unknown_user",
            Self::InvalidSubject => "invalid_subject",
            Self::AlreadyGranted(_) => "already_granted",
            Self::NotGranted(_) => "not_granted",
            Self::Store(_) => "internal_error",
        }
    }
}
