use parley_model::{
    ErrorKind, FunctionCall, FunctionCallDelta, ResponseChunk, Role,
};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "function_call")]
    FunctionCall(FunctionCall),
    /// A raw chunk, sent as is.
    #[serde(rename = "chunk")]
    Chunk(ResponseChunk),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
    /// The kind of the injected failures.
    #[serde(default = "default_failure_kind")]
    pub failure_kind: ErrorKind,
    /// Skips the leading chunk that carries the role.
    #[serde(default)]
    pub omit_role: bool,
}

fn default_failure_kind() -> ErrorKind {
    ErrorKind::Transient
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            failure_kind: ErrorKind::Transient,
            omit_role: false,
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Sets the kind of the injected failures.
    #[inline]
    pub fn with_failure_kind(mut self, kind: ErrorKind) -> Self {
        self.failure_kind = kind;
        self
    }

    /// Doesn't send the role, like providers do on continuation turns.
    #[inline]
    pub fn without_role(mut self) -> Self {
        self.omit_role = true;
        self
    }

    /// Expands the events into the chunks a provider would send.
    pub(crate) fn to_chunks(&self) -> Vec<ResponseChunk> {
        let mut chunks = vec![];
        if !self.omit_role {
            chunks.push(ResponseChunk {
                role: Some(Role::Assistant),
                ..Default::default()
            });
        }

        let mut has_function_call = false;
        for event in &self.events {
            match event {
                PresetEvent::MessageDelta(content) => {
                    chunks.push(ResponseChunk {
                        content: Some(content.clone()),
                        ..Default::default()
                    });
                }
                PresetEvent::FunctionCall(call) => {
                    has_function_call = true;
                    // Name first, then arguments, like a real stream.
                    chunks.push(ResponseChunk {
                        function_call: Some(FunctionCallDelta {
                            name: Some(call.name.clone()),
                            arguments: Some(String::new()),
                        }),
                        ..Default::default()
                    });
                    chunks.push(ResponseChunk {
                        function_call: Some(FunctionCallDelta {
                            name: None,
                            arguments: Some(call.arguments.clone()),
                        }),
                        ..Default::default()
                    });
                }
                PresetEvent::Chunk(chunk) => chunks.push(chunk.clone()),
            }
        }

        let finish_reason = if has_function_call {
            "function_call"
        } else {
            "stop"
        };
        chunks.push(ResponseChunk {
            finish_reason: Some(finish_reason.to_owned()),
            ..Default::default()
        });
        chunks
    }
}
