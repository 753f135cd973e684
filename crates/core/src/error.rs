use parley_model::{
    Choice, ErrorKind as ProviderErrorKind, ModelProviderError,
};
use serde_json::Value;
use thiserror::Error;

/// The kind of error that occurred during a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The stream was stopped on purpose through the delta callback.
    Cancelled,
    /// The remote service reported an unrecoverable error.
    Remote,
    /// The response doesn't follow the wire protocol.
    Protocol,
    /// A failure that may go away when the request is sent again.
    Transient,
    /// Function arguments or a structured reply failed validation.
    Validation,
    /// The reply broke the contract of the conversation, for example by
    /// carrying more than one choice or calling an unknown function.
    Contract,
    /// A local function returned an error.
    Function,
}

impl ErrorKind {
    /// Returns `true` if the failed operation may be attempted again.
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Errors surfaced by [`Conversation::send_message`].
///
/// [`Conversation::send_message`]: crate::Conversation::send_message
#[derive(Debug, Error)]
pub enum Error {
    /// The stream was cancelled, carrying what was received until then.
    #[error("the response stream was cancelled")]
    Cancelled {
        /// Choices built before the cancellation, possibly incomplete.
        choices: Vec<Choice>,
    },
    /// The remote service reported an error that retrying won't fix.
    #[error("remote error: {message}")]
    Remote {
        /// Description of the error.
        message: String,
        /// The raw error body, if the service sent one.
        payload: Option<Value>,
    },
    /// The response violated the wire protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The request failed for a reason that may be temporary.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The model asked for a function that isn't registered.
    #[error("function not found: {0}")]
    FunctionNotFound(String),
    /// The arguments supplied by the model are not acceptable.
    #[error("invalid arguments for function `{function}`: {}", errors.join("; "))]
    InvalidArguments {
        /// Name of the function.
        function: String,
        /// Diagnostics from parsing and schema validation.
        errors: Vec<String>,
    },
    /// The function was invoked but failed.
    #[error("function `{function}` failed: {reason}")]
    FunctionFailed {
        /// Name of the function.
        function: String,
        /// Why the function failed.
        reason: String,
    },
    /// The structured reply doesn't satisfy the expectation.
    #[error("reply doesn't match the expected schema: {}", errors.join("; "))]
    InvalidReply {
        /// Diagnostics from parsing and schema validation.
        errors: Vec<String>,
    },
    /// The provider returned a number of choices other than one.
    #[error("expected exactly one choice, got {0}")]
    ChoiceCount(usize),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Transient(_) => ErrorKind::Transient,
            Error::FunctionNotFound(_) | Error::ChoiceCount(_) => {
                ErrorKind::Contract
            }
            Error::InvalidArguments { .. } | Error::InvalidReply { .. } => {
                ErrorKind::Validation
            }
            Error::FunctionFailed { .. } => ErrorKind::Function,
        }
    }

    /// Classifies an error reported by a model provider.
    pub(crate) fn from_provider(err: &dyn ModelProviderError) -> Self {
        match err.kind() {
            ProviderErrorKind::Remote => Error::Remote {
                message: err.to_string(),
                payload: err.payload().cloned(),
            },
            ProviderErrorKind::Protocol => Error::Protocol(err.to_string()),
            ProviderErrorKind::Transient => Error::Transient(err.to_string()),
        }
    }
}
