//! Conversation engine: retries, response aggregation, function calling
//! and structured output on top of a [`ModelProvider`].
//!
//! [`ModelProvider`]: parley_model::ModelProvider

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod aggregator;
pub mod conversation;
mod error;
mod expectation;
pub mod function;
mod model_client;
mod repair;
mod retry;
mod schema;

pub use aggregator::{Canceller, StreamDelta};
pub use conversation::{Conversation, ConversationBuilder, SendOptions};
pub use error::{Error, ErrorKind};
pub use expectation::Expectation;
pub use function::{FnFunction, Function};
pub use model_client::DeltaCallback;
pub use parley_model as model;
pub use retry::RetryPolicy;
pub use schema::schema_for;
