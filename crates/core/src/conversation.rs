//! The conversation state machine.

mod builder;
mod options;

use parley_model::{
    Choice, FunctionCall, FunctionCallMode, Message, ModelRequest,
    SamplingParams,
};
use tracing::Instrument;

pub use builder::ConversationBuilder;
pub use options::SendOptions;

use crate::Error;
use crate::function::Registry;
use crate::model_client::{DeltaCallback, ModelClient};
use crate::retry::RetryPolicy;

/// A conversation with a model, owning its message log and functions.
///
/// Turns must not overlap, which `&mut self` on
/// [`send_message`](Self::send_message) already guarantees. Independent
/// conversations can run in parallel.
pub struct Conversation {
    pub(crate) model_client: ModelClient,
    pub(crate) registry: Registry,
    pub(crate) messages: Vec<Message>,
    pub(crate) function_call: Option<FunctionCallMode>,
    pub(crate) params: SamplingParams,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) max_function_rounds: usize,
}

#[derive(Debug)]
enum TurnStage {
    AwaitingCompletion,
    FunctionRequested(FunctionCall),
    Finished(Choice),
}

impl Conversation {
    /// Sends a user message and returns the reply.
    ///
    /// The prompt and every reply are appended to the log, including the
    /// function calls made by the model and their results. With an
    /// [`Expectation`](crate::Expectation), the prompt is augmented with
    /// the schema, and the augmented text is what the log keeps.
    ///
    /// On error, messages appended before the failure stay in the log.
    pub async fn send_message<S: Into<String>>(
        &mut self,
        prompt: S,
        options: SendOptions,
    ) -> Result<Choice, Error> {
        let span = debug_span!("turn", messages = self.messages.len());
        self.run_turn(prompt.into(), options).instrument(span).await
    }

    /// Appends a message to the log without sending anything.
    #[inline]
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the message log.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    async fn run_turn(
        &mut self,
        prompt: String,
        options: SendOptions,
    ) -> Result<Choice, Error> {
        let SendOptions {
            params,
            function_call,
            expectation,
            on_delta,
        } = options;

        let content = match &expectation {
            Some(expectation) => expectation.augment_prompt(&prompt),
            None => prompt,
        };
        self.messages.push(Message::user(content));

        let params = self.params.overlay(&params);
        let mut function_call = function_call.or(self.function_call.clone());
        let mut rounds = 0;
        let mut stage = TurnStage::AwaitingCompletion;
        let choice = loop {
            trace!("turn stage: {stage:?}");
            stage = match stage {
                TurnStage::AwaitingCompletion => {
                    let choice = self
                        .complete(&params, function_call.clone(), &on_delta)
                        .await?;
                    self.messages.push(choice.clone().into_message());
                    match choice.function_call.clone() {
                        Some(call) if rounds < self.max_function_rounds => {
                            TurnStage::FunctionRequested(call)
                        }
                        Some(call) => {
                            debug!(
                                "function round limit reached, returning the \
                                 call to `{}`",
                                call.name
                            );
                            TurnStage::Finished(choice)
                        }
                        None => TurnStage::Finished(choice),
                    }
                }
                TurnStage::FunctionRequested(call) => {
                    rounds += 1;
                    let name = match &function_call {
                        Some(FunctionCallMode::Named(forced)) => forced.clone(),
                        _ => call.name,
                    };
                    let result =
                        self.registry.dispatch(&name, &call.arguments).await?;
                    self.messages
                        .push(Message::function(name, result.to_string()));
                    // A forced function is only forced once.
                    if let Some(FunctionCallMode::Named(_)) = function_call {
                        function_call = Some(FunctionCallMode::Auto);
                    }
                    TurnStage::AwaitingCompletion
                }
                TurnStage::Finished(choice) => break choice,
            };
        };

        if let Some(expectation) = &expectation {
            expectation.validate_reply(&choice.content)?;
        }
        Ok(choice)
    }

    /// Requests a completion of the current log, retrying transient
    /// failures, and checks that exactly one choice came back.
    async fn complete(
        &self,
        params: &SamplingParams,
        function_call: Option<FunctionCallMode>,
        on_delta: &Option<DeltaCallback>,
    ) -> Result<Choice, Error> {
        let request = ModelRequest {
            messages: self.messages.clone(),
            functions: self.registry.definitions(),
            function_call: function_call.filter(|_| !self.registry.is_empty()),
            params: params.clone(),
            stream: on_delta.is_some(),
        };

        let model_client = &self.model_client;
        let request = &request;
        let choices = self
            .retry_policy
            .attempt(|| {
                model_client.send_request(request.clone(), on_delta.clone())
            })
            .await?;

        let count = choices.len();
        let mut choices = choices.into_iter();
        match (choices.next(), choices.next()) {
            (Some(choice), None) => Ok(choice),
            _ => {
                error!("expected exactly one choice, got {count}");
                Err(Error::ChoiceCount(count))
            }
        }
    }
}
