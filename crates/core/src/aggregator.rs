use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_model::{Choice, FunctionCall, ResponseChunk, Role};

use crate::Error;

/// The part of a chunk that is shown to the delta callback.
///
/// Function call fragments are left out, a function call is only
/// meaningful once the stream has ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDelta<'a> {
    /// Index of the choice this delta belongs to.
    pub index: u32,
    /// The role, usually only present in the first delta of a choice.
    pub role: Option<Role>,
    /// A fragment of the message content.
    pub content: Option<&'a str>,
    /// Why the model stopped, present in the last delta of a choice.
    pub finish_reason: Option<&'a str>,
}

impl<'a> From<&'a ResponseChunk> for StreamDelta<'a> {
    fn from(chunk: &'a ResponseChunk) -> Self {
        Self {
            index: chunk.index,
            role: chunk.role,
            content: chunk.content.as_deref(),
            finish_reason: chunk.finish_reason.as_deref(),
        }
    }
}

/// Passed to the delta callback to stop the stream early.
///
/// Cancelling doesn't interrupt the callback itself. The stream is dropped
/// once the callback returns, and the turn fails with
/// [`Error::Cancelled`] carrying what was received so far.
#[derive(Debug, Default)]
pub struct Canceller {
    cancelled: AtomicBool,
}

impl Canceller {
    /// Requests the stream to stop.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct PartialChoice {
    role: Option<Role>,
    content: String,
    finish_reason: Option<String>,
    function_name: Option<String>,
    function_arguments: Option<String>,
}

impl PartialChoice {
    fn apply(&mut self, chunk: ResponseChunk) {
        if self.role.is_none() {
            self.role = chunk.role;
        }
        if let Some(content) = chunk.content {
            self.content.push_str(&content);
        }
        if let Some(delta) = chunk.function_call {
            if let Some(name) = delta.name {
                self.function_name.get_or_insert_default().push_str(&name);
            }
            if let Some(arguments) = delta.arguments {
                self.function_arguments
                    .get_or_insert_default()
                    .push_str(&arguments);
            }
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
    }

    fn has_function_call(&self) -> bool {
        self.function_name.is_some() || self.function_arguments.is_some()
    }

    fn into_choice(self) -> Choice {
        let function_call = self.has_function_call().then(|| FunctionCall {
            name: self.function_name.unwrap_or_default(),
            arguments: self.function_arguments.unwrap_or_default(),
        });
        Choice {
            role: self.role.unwrap_or_default(),
            content: self.content,
            finish_reason: self.finish_reason,
            function_call,
        }
    }
}

/// Folds the chunks of a response into complete choices.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    choices: BTreeMap<u32, PartialChoice>,
}

impl Aggregator {
    pub fn push(&mut self, chunk: ResponseChunk) {
        self.choices.entry(chunk.index).or_default().apply(chunk);
    }

    /// Returns the choices built so far without checking them, used when
    /// the stream didn't run to the end.
    pub fn into_partial_choices(self) -> Vec<Choice> {
        self.choices
            .into_values()
            .map(PartialChoice::into_choice)
            .collect()
    }

    /// Finishes the aggregation after the stream has ended.
    pub fn finish(self) -> Result<Vec<Choice>, Error> {
        self.choices
            .into_iter()
            .map(|(index, partial)| {
                if partial.has_function_call()
                    && partial.function_name.as_deref().unwrap_or("").is_empty()
                {
                    return Err(Error::Protocol(format!(
                        "choice {index} has a function call without a name"
                    )));
                }
                Ok(partial.into_choice())
            })
            .collect()
    }
}
