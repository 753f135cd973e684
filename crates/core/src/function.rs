//! Functions that the model can call.

mod error;
mod object;
mod registry;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use registry::Registry;

/// The result of a function call.
pub type FunctionResult<T> = Result<T, Error>;

/// A local function that can be called by the model.
///
/// Arguments from the model are checked against
/// [`parameter_schema`](Function::parameter_schema) before being
/// deserialized into [`Input`](Function::Input), and the returned
/// [`Output`](Function::Output) is sent back to the model as JSON.
pub trait Function: Send + Sync + 'static {
    /// The type of input that the function accepts.
    type Input: DeserializeOwned;

    /// The type of output that the function produces.
    type Output: Serialize;

    /// Returns the name of the function.
    fn name(&self) -> &str;

    /// Returns the description of the function.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Returns the parameter schema of the function.
    fn parameter_schema(&self) -> &Value;

    /// Calls the function with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`.
    fn call(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = FunctionResult<Self::Output>> + Send + 'static;
}

/// A [`Function`] backed by a closure that takes the raw JSON arguments.
pub struct FnFunction<F> {
    name: String,
    description: String,
    parameter_schema: Value,
    f: F,
}

impl<F> FnFunction<F> {
    /// Creates a function from a closure. An empty description is not
    /// sent to the model.
    pub fn new<N, D>(
        name: N,
        description: D,
        parameter_schema: Value,
        f: F,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
            f,
        }
    }
}

impl<F, Fut, O> Function for FnFunction<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FunctionResult<O>> + Send + 'static,
    O: Serialize,
{
    type Input = Value;
    type Output = O;

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn description(&self) -> Option<&str> {
        Some(&self.description[..]).filter(|d| !d.is_empty())
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[inline]
    fn call(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = FunctionResult<Self::Output>> + Send + 'static
    {
        (self.f)(input)
    }
}
