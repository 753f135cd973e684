//! A local fake model for testing purpose.

#[macro_use]
extern crate tracing;

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use parley_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ResponseChunk, Role,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    chunks: VecDeque<ResponseChunk>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            // Calling this method after completion also ends up here.
            return Poll::Ready(Ok(this.chunks.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_chunk(cx)
    }
}

#[derive(Clone)]
enum ConversationStep {
    Input(Role),
    AssistantResponse(PresetResponse),
}

#[derive(Default)]
struct SharedState {
    requests: Vec<ModelRequest>,
    attempts: HashMap<usize, u64>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The added steps will be
/// selected according to the history messages in your request. If there are no
/// enough steps in the script, an error will be returned.
///
/// Clones share the recorded requests, so a test can keep a clone and
/// inspect what the conversation sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    state: Arc<Mutex<SharedState>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_system_prompt_step(&mut self) {
        self.conversation_script
            .push(ConversationStep::Input(Role::System));
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script
            .push(ConversationStep::Input(Role::User));
    }

    #[inline]
    pub fn add_function_result_step(&mut self) {
        self.conversation_script
            .push(ConversationStep::Input(Role::Function));
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all the requests received so far, including failed ones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock_state().requests.clone()
    }

    /// Returns how many requests were received.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock_state().requests.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        // A panicking test may poison the lock, the data is still usable.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let step_idx = req.messages.len();
        let mut state = self.lock_state();
        state.requests.push(req.clone());

        let Some(step) = self.conversation_script.get(step_idx) else {
            return Err(Error {
                message: format!("no enough steps for {step_idx} messages"),
                kind: ErrorKind::Protocol,
            });
        };
        let preset = match step {
            ConversationStep::Input(role) => {
                return Err(Error {
                    message: format!("expected a response, found {role} step"),
                    kind: ErrorKind::Protocol,
                });
            }
            ConversationStep::AssistantResponse(preset) => preset,
        };

        let attempt = state.attempts.entry(step_idx).or_default();
        *attempt += 1;
        if let Some(failures) = preset.failures {
            if failures == 0 || *attempt <= failures {
                debug!("injecting failure #{attempt} for step {step_idx}");
                return Err(Error {
                    message: format!("injected failure #{attempt}"),
                    kind: preset.failure_kind,
                });
            }
        }

        Ok(TestModelResponse {
            chunks: preset.to_chunks().into(),
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.respond(req))
    }
}
