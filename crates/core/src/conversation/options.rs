use std::fmt::{self, Debug};
use std::sync::Arc;

use parley_model::{FunctionCallMode, SamplingParams};

use crate::aggregator::{Canceller, StreamDelta};
use crate::expectation::Expectation;
use crate::model_client::DeltaCallback;

/// Per-call options of [`Conversation::send_message`].
///
/// Every option that is set here takes precedence over the conversation
/// defaults for this call only.
///
/// [`Conversation::send_message`]: crate::Conversation::send_message
#[derive(Clone, Default)]
pub struct SendOptions {
    pub(crate) params: SamplingParams,
    pub(crate) function_call: Option<FunctionCallMode>,
    pub(crate) expectation: Option<Expectation>,
    pub(crate) on_delta: Option<DeltaCallback>,
}

impl SendOptions {
    /// Overrides sampling parameters. Unset fields keep the conversation
    /// defaults.
    #[inline]
    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    /// Overrides how the model may call functions.
    ///
    /// When a function is forced with [`FunctionCallMode::Named`], that
    /// function is the one dispatched, and the follow-up request lets the
    /// model decide on its own.
    #[inline]
    pub fn with_function_call(
        mut self,
        function_call: FunctionCallMode,
    ) -> Self {
        self.function_call = Some(function_call);
        self
    }

    /// Requires the reply to be JSON conforming to `expectation`.
    #[inline]
    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectation = Some(expectation);
        self
    }

    /// Streams the response, calling `on_delta` for every chunk.
    ///
    /// The callback receives a [`Canceller`] that stops the stream.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(&StreamDelta<'_>, &Canceller) + Send + Sync + 'static,
    ) -> Self {
        self.on_delta = Some(Arc::new(on_delta));
        self
    }
}

impl Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("params", &self.params)
            .field("function_call", &self.function_call)
            .field("expectation", &self.expectation)
            .field("stream", &self.on_delta.is_some())
            .finish()
    }
}
