//! Action error types.

/// Errors raised when an action cannot be dispatched.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ActionError {
    /// The provider has no action with this name.
    #[error("{provider} has no action named '{action}'")]
    UnknownAction {
        /// Provider that was asked.
        provider: String,
        /// Requested action name.
        action: String,
    },

    /// The arguments do not match the action's schema.
    #[error("invalid arguments for '{action}': {message}")]
    InvalidArguments {
        /// Action whose arguments were rejected.
        action: String,
        /// Deserialization failure.
        message: String,
    },
}

impl ActionError {
    /// Create an unknown action error.
    #[must_use]
    pub fn unknown_action(provider: impl Into<String>, action: impl Into<String>) -> Self {
        Self::UnknownAction {
            provider: provider.into(),
            action: action.into(),
        }
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(action: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidArguments {
            action: action.into(),
            message: message.to_string(),
        }
    }
}
