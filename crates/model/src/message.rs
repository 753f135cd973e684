use std::fmt::{self, Display};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The author of a message.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// Text written by the user.
    User,
    /// A reply generated by the model.
    #[default]
    Assistant,
    /// The result of a function the model asked to call.
    Function,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        };
        f.write_str(s)
    }
}

/// A function call requested by the model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call.
    pub name: String,
    /// Arguments as the raw text the model produced.
    ///
    /// This is usually JSON, but nothing guarantees it is well-formed.
    pub arguments: String,
}

/// A complete message in the conversation log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// The author of this message.
    pub role: Role,
    /// The text content, empty for a bare function call.
    pub content: String,
    /// For `function` messages, the name of the function that produced
    /// the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The function call requested by an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Message {
    /// Creates a message with the given role and content.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
        }
    }

    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a message carrying the result of the named function.
    #[inline]
    pub fn function<N: Into<String>, S: Into<String>>(
        name: N,
        content: S,
    ) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(Role::Function, content)
        }
    }
}

/// One fully aggregated candidate reply from the model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Choice {
    /// The author of the reply.
    pub role: Role,
    /// The accumulated text content.
    pub content: String,
    /// Why the model stopped generating, as reported by the provider.
    pub finish_reason: Option<String>,
    /// The requested function call, if any.
    pub function_call: Option<FunctionCall>,
}

impl Choice {
    /// Parses the content of this choice as JSON.
    #[inline]
    pub fn parse_content<T: DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.content)
    }

    /// Converts the choice into a log message.
    ///
    /// The finish reason is transport metadata and does not become part
    /// of the conversation.
    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
            name: None,
            function_call: self.function_call,
        }
    }
}
