use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Message;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The conversation history, in order.
    pub messages: Vec<Message>,
    /// Functions that are available to the model.
    pub functions: Vec<FunctionDeclaration>,
    /// Controls whether and which function the model calls.
    pub function_call: Option<FunctionCallMode>,
    /// Sampling parameters for this request.
    pub params: SamplingParams,
    /// Whether the response should be streamed as incremental chunks.
    pub stream: bool,
}

/// Describes a function that can be called by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionDeclaration {
    /// Name of the function.
    pub name: String,
    /// Description of the function.
    pub description: Option<String>,
    /// Parameters definition of the function.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// How the model is allowed to use the declared functions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionCallMode {
    /// The model decides whether to call a function.
    Auto,
    /// The model must not call any function.
    None,
    /// The model must call the named function.
    Named(String),
}

/// Sampling parameters of a completion request.
///
/// Every field is optional, an absent field is left for the provider to
/// decide. Parameters are layered: conversation defaults first, then
/// per-call overrides, see [`SamplingParams::overlay`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Nucleus sampling probability mass.
    pub top_p: Option<f64>,
    /// How many choices to generate.
    pub n: Option<u32>,
    /// Sequences where the model stops generating.
    pub stop: Option<Vec<String>>,
    /// Penalty for frequent tokens.
    pub frequency_penalty: Option<f64>,
    /// Penalty for tokens that already appeared.
    pub presence_penalty: Option<f64>,
    /// Per-token likelihood adjustments.
    pub logit_bias: Option<BTreeMap<String, f64>>,
    /// Upper bound of generated tokens.
    pub max_tokens: Option<u32>,
    /// An identifier of the end user.
    pub user: Option<String>,
}

impl SamplingParams {
    /// Layers `overrides` on top of `self`.
    ///
    /// Each field of `overrides` that is set replaces the corresponding
    /// field of `self`; unset fields keep the value from `self`. Fields
    /// are never merged, so an overriding `stop` list or `logit_bias`
    /// map replaces the default one as a whole.
    pub fn overlay(&self, overrides: &SamplingParams) -> SamplingParams {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.as_ref().or(base.as_ref()).cloned()
        }

        SamplingParams {
            temperature: pick(&self.temperature, &overrides.temperature),
            top_p: pick(&self.top_p, &overrides.top_p),
            n: pick(&self.n, &overrides.n),
            stop: pick(&self.stop, &overrides.stop),
            frequency_penalty: pick(
                &self.frequency_penalty,
                &overrides.frequency_penalty,
            ),
            presence_penalty: pick(
                &self.presence_penalty,
                &overrides.presence_penalty,
            ),
            logit_bias: pick(&self.logit_bias, &overrides.logit_bias),
            max_tokens: pick(&self.max_tokens, &overrides.max_tokens),
            user: pick(&self.user, &overrides.user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay() {
        let defaults = SamplingParams {
            temperature: Some(0.2),
            n: Some(1),
            stop: Some(vec!["\n".to_owned(), "END".to_owned()]),
            user: Some("alice".to_owned()),
            ..Default::default()
        };
        let overrides = SamplingParams {
            temperature: Some(0.9),
            stop: Some(vec!["STOP".to_owned()]),
            max_tokens: Some(64),
            ..Default::default()
        };

        let resolved = defaults.overlay(&overrides);
        assert_eq!(resolved.temperature, Some(0.9));
        assert_eq!(resolved.n, Some(1));
        assert_eq!(resolved.stop, Some(vec!["STOP".to_owned()]));
        assert_eq!(resolved.max_tokens, Some(64));
        assert_eq!(resolved.user.as_deref(), Some("alice"));
        assert_eq!(resolved.top_p, None);

        assert_eq!(defaults.overlay(&SamplingParams::default()), defaults);
    }
}
