use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The kind of error that occurred while talking to a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The response doesn't follow the wire protocol, such as an unknown
    /// frame or a payload that fails structural validation.
    Protocol,
    /// The remote side reported an error that retrying will not fix, for
    /// example the context length being exceeded.
    Remote,
    /// Network failures, server errors and other faults that may go away
    /// if the request is sent again.
    Transient,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Protocol => write!(f, "Protocol violation"),
            ErrorKind::Remote => write!(f, "Remote error"),
            ErrorKind::Transient => write!(f, "Transient failure"),
        }
    }
}
