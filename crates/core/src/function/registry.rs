use std::collections::HashMap;
use std::sync::Arc;

use parley_model::FunctionDeclaration;
use serde_json::Value;
use tracing::Instrument;

use super::object::{FunctionObject, FunctionObjectImpl};
use super::{ErrorKind, Function};
use crate::{Error, repair, schema};

/// Functions available to the model, keyed by name.
#[derive(Default)]
pub(crate) struct Registry {
    functions: HashMap<String, Arc<dyn FunctionObject>>,
}

impl Registry {
    /// Registers a function. A function with the same name is replaced.
    pub fn add_function<F: Function>(&mut self, function: F) {
        let name = function.name().to_owned();
        let replaced = self
            .functions
            .insert(name, Arc::new(FunctionObjectImpl(function)));
        if let Some(replaced) = replaced {
            warn!("function `{}` was registered twice", replaced.name());
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the declarations sent to the model, ordered by name.
    pub fn definitions(&self) -> Vec<FunctionDeclaration> {
        let mut definitions: Vec<_> = self
            .functions
            .values()
            .map(|function| FunctionDeclaration {
                name: function.name().to_owned(),
                description: function.description().map(str::to_owned),
                parameters: function.parameter_schema().clone(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Calls the function `name` with the raw arguments from the model.
    ///
    /// The arguments are repaired if needed, parsed, and checked against
    /// the parameter schema before the function runs. Every call reaches
    /// the function, nothing is cached.
    pub async fn dispatch(
        &self,
        name: &str,
        raw_arguments: &str,
    ) -> Result<Value, Error> {
        let Some(function) = self.functions.get(name) else {
            warn!("function not found: {name}");
            return Err(Error::FunctionNotFound(name.to_owned()));
        };

        let invalid_arguments = |errors| Error::InvalidArguments {
            function: name.to_owned(),
            errors,
        };
        // Models send an empty string for functions without parameters.
        let arguments = if raw_arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            repair::parse_lenient(raw_arguments)
                .map_err(|err| invalid_arguments(vec![err.to_string()]))?
        };
        schema::validate(function.parameter_schema(), &arguments)
            .map_err(invalid_arguments)?;

        trace!("calling `{name}` with args: {arguments}");
        Arc::clone(function)
            .call(arguments)
            .instrument(debug_span!("function dispatch", function = name))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidInput => Error::InvalidArguments {
                    function: name.to_owned(),
                    errors: vec![err.reason().into_owned()],
                },
                ErrorKind::ExecutionError => Error::FunctionFailed {
                    function: name.to_owned(),
                    reason: err.reason().into_owned(),
                },
            })
    }
}
