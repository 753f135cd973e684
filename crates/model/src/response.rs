use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::Role;
use crate::provider::ModelProviderError;

/// A response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next chunk from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next chunk. Implementations will ensure that the current
    ///   task will be notified when the next chunk may be ready.
    /// - `Poll::Ready(Ok(Some(chunk)))` means the response has a chunk
    ///   to deliver, and may produce further chunks on subsequent
    ///   `poll_next_chunk` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    ///
    /// Buffered (non-streaming) responses deliver each choice as a single
    /// chunk carrying every field at once.
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>>;
}

/// A fragment of a function call carried by a chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// A fragment of the function name.
    pub name: Option<String>,
    /// A fragment of the raw arguments text.
    pub arguments: Option<String>,
}

/// An incremental update to exactly one choice of a response.
///
/// Any combination of fields may be present, including none of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// The slot of the choice this chunk updates.
    pub index: u32,
    /// The role of the choice, usually only sent with the first chunk.
    pub role: Option<Role>,
    /// A content fragment to append.
    pub content: Option<String>,
    /// Function call fragments to append.
    pub function_call: Option<FunctionCallDelta>,
    /// Why the model stopped generating this choice.
    pub finish_reason: Option<String>,
}
