//! An abstraction layer between the conversation engine and the remote
//! completion services.
//!
//! This crate establishes an unified protocol for the conversation to
//! interact with chat-completion providers, so that the conversation can
//! seamlessly switch between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;
mod request;
mod response;

pub use error::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
