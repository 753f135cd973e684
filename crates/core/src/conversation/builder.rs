use parley_model::{FunctionCallMode, Message, ModelProvider, SamplingParams};

use super::Conversation;
use crate::function::{Function, Registry};
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;

/// [`Conversation`] builder.
pub struct ConversationBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    registry: Registry,
    function_call: Option<FunctionCallMode>,
    params: SamplingParams,
    retry_policy: RetryPolicy,
    max_function_rounds: usize,
}

impl ConversationBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            registry: Registry::default(),
            function_call: None,
            params: SamplingParams::default(),
            retry_policy: RetryPolicy::default(),
            max_function_rounds: 1,
        }
    }

    /// Seeds the conversation with a system message.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a function. Registering a name twice keeps the last one.
    #[inline]
    pub fn with_function<F: Function>(mut self, function: F) -> Self {
        self.registry.add_function(function);
        self
    }

    /// Sets the default function call mode.
    #[inline]
    pub fn with_function_call(
        mut self,
        function_call: FunctionCallMode,
    ) -> Self {
        self.function_call = Some(function_call);
        self
    }

    /// Sets the default sampling parameters.
    #[inline]
    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the retry policy, see [`RetryPolicy::default`] for the default
    /// one.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets how many function calls are answered automatically in a
    /// single turn. Defaults to 1, `0` returns function calls to the
    /// caller without dispatching them.
    #[inline]
    pub fn with_max_function_rounds(mut self, rounds: usize) -> Self {
        self.max_function_rounds = rounds;
        self
    }

    /// Builds the conversation.
    pub fn build(self) -> Conversation {
        let messages = self
            .system_prompt
            .map(Message::system)
            .into_iter()
            .collect();
        Conversation {
            model_client: self.model_client,
            registry: self.registry,
            messages,
            function_call: self.function_call,
            params: self.params,
            retry_policy: self.retry_policy,
            max_function_rounds: self.max_function_rounds,
        }
    }
}
