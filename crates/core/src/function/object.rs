use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Function, FunctionResult};

type BoxedCallFuture =
    Pin<Box<dyn Future<Output = FunctionResult<Value>> + Send>>;

pub(crate) trait FunctionObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str>;

    fn parameter_schema(&self) -> &Value;

    fn call(self: Arc<Self>, arguments: Value) -> BoxedCallFuture;
}

pub(crate) struct FunctionObjectImpl<F: Function>(pub F);

impl<F: Function> FunctionObject for FunctionObjectImpl<F> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> Option<&str> {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn call(self: Arc<Self>, arguments: Value) -> BoxedCallFuture {
        let input: F::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };

        let fut = self.0.call(input);
        Box::pin(
            async move {
                let output = fut.await?;
                trace!("function returned");
                serde_json::to_value(output).map_err(|err| {
                    Error::execution_error()
                        .with_reason(format!("unserializable output: {err}"))
                })
            }
            .instrument(trace_span!("function call")),
        )
    }
}
