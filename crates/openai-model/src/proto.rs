use std::collections::BTreeMap;

use parley_model::{
    FunctionCallDelta, FunctionCallMode, FunctionDeclaration, ModelRequest,
    ResponseChunk, Role,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCallFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl From<FunctionCallFragment> for FunctionCallDelta {
    #[inline]
    fn from(fragment: FunctionCallFragment) -> Self {
        FunctionCallDelta {
            name: fragment.name,
            arguments: fragment.arguments,
        }
    }
}

/// One frame of a streamed response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCallFragment>,
}

impl ChatCompletionChunk {
    pub fn into_response_chunks(self) -> impl Iterator<Item = ResponseChunk> {
        self.choices.into_iter().map(|choice| ResponseChunk {
            index: choice.index,
            role: choice.delta.role,
            content: choice.delta.content,
            function_call: choice.delta.function_call.map(Into::into),
            finish_reason: choice.finish_reason,
        })
    }
}

/// A complete, non-streamed response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CompletionChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCallFragment>,
}

impl ChatCompletion {
    /// Projects every choice into a single chunk carrying all its fields.
    ///
    /// Choices are indexed by position, since buffered replies don't have
    /// to carry an `index`.
    pub fn into_response_chunks(self) -> impl Iterator<Item = ResponseChunk> {
        self.choices
            .into_iter()
            .zip(0..)
            .map(|(choice, index)| ResponseChunk {
                index,
                role: choice.message.role,
                content: choice.message.content,
                function_call: choice.message.function_call.map(Into::into),
                finish_reason: choice.finish_reason,
            })
    }
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionDef {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
enum FunctionCallChoice {
    Mode(&'static str),
    Named { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionCallPayload {
    name: String,
    arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCallPayload>,
    },
    Function {
        name: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    functions: Vec<FunctionDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let params = req.params.clone();
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        functions: req.functions.iter().map(create_function).collect(),
        function_call: req.function_call.as_ref().map(create_function_call),
        temperature: params.temperature,
        top_p: params.top_p,
        n: params.n,
        stop: params.stop,
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        logit_bias: params.logit_bias,
        max_tokens: params.max_tokens,
        user: params.user,
        stream: req.stream,
    }
}

#[inline]
fn create_message(msg: &parley_model::Message) -> Message {
    match msg.role {
        Role::System => Message::System {
            content: msg.content.clone(),
        },
        Role::User => Message::User {
            content: msg.content.clone(),
            name: msg.name.clone(),
        },
        Role::Assistant => {
            let function_call =
                msg.function_call.as_ref().map(|call| FunctionCallPayload {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            // A bare function call has no content on the wire.
            let content = if msg.content.is_empty() && function_call.is_some()
            {
                None
            } else {
                Some(msg.content.clone())
            };
            Message::Assistant {
                content,
                function_call,
            }
        }
        Role::Function => Message::Function {
            name: msg.name.clone().unwrap_or_default(),
            content: msg.content.clone(),
        },
    }
}

#[inline]
fn create_function(function: &FunctionDeclaration) -> FunctionDef {
    FunctionDef {
        name: function.name.clone(),
        description: function.description.clone(),
        parameters: function.parameters.clone(),
    }
}

#[inline]
fn create_function_call(mode: &FunctionCallMode) -> FunctionCallChoice {
    match mode {
        FunctionCallMode::Auto => FunctionCallChoice::Mode("auto"),
        FunctionCallMode::None => FunctionCallChoice::Mode("none"),
        FunctionCallMode::Named(name) => {
            FunctionCallChoice::Named { name: name.clone() }
        }
    }
}
