use schemars::JsonSchema;
use serde_json::Value;

use crate::{Error, repair, schema};

/// A contract the next assistant reply must satisfy.
///
/// The schema and examples are appended to the prompt, and the reply is
/// parsed as JSON and checked against the schema once it arrives.
#[derive(Clone, Debug, PartialEq)]
pub struct Expectation {
    schema: Value,
    examples: Vec<Value>,
}

impl Expectation {
    /// Creates an expectation from a JSON schema.
    #[inline]
    pub fn new(schema: Value) -> Self {
        Self {
            schema,
            examples: vec![],
        }
    }

    /// Creates an expectation whose schema is derived from `T`.
    ///
    /// The reply can then be decoded with [`Choice::parse_content`].
    ///
    /// [`Choice::parse_content`]: parley_model::Choice::parse_content
    #[inline]
    pub fn for_type<T: JsonSchema>() -> Self {
        Self::new(schema::schema_for::<T>())
    }

    /// Adds an example of a valid reply.
    #[inline]
    pub fn with_example(mut self, example: Value) -> Self {
        self.examples.push(example);
        self
    }

    /// Returns the schema of this expectation.
    #[inline]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns the text actually sent for `prompt`.
    pub fn augment_prompt(&self, prompt: &str) -> String {
        let mut text = String::with_capacity(prompt.len() + 256);
        text.push_str(prompt);
        text.push_str(
            "\n\nRespond only with a JSON value that conforms to the \
             following JSON schema, without any other text:\n",
        );
        text.push_str(&format!("```json\n{:#}\n```", self.schema));
        if !self.examples.is_empty() {
            text.push_str("\n\nExamples of valid responses:");
            for example in &self.examples {
                text.push_str(&format!("\n```json\n{example:#}\n```"));
            }
        }
        text
    }

    /// Parses `content` as JSON and checks it against the schema.
    pub fn validate_reply(&self, content: &str) -> Result<Value, Error> {
        let value = repair::parse_lenient(repair::strip_code_fence(content))
            .map_err(|err| Error::InvalidReply {
                errors: vec![format!("reply is not JSON: {err}")],
            })?;
        schema::validate(&self.schema, &value)
            .map_err(|errors| Error::InvalidReply { errors })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Answer {
        answer: i64,
    }

    #[test]
    fn test_augment_prompt() {
        let expectation = Expectation::new(json!({ "type": "integer" }))
            .with_example(json!(42));
        let text = expectation.augment_prompt("What is 6 times 7?");
        assert!(text.starts_with("What is 6 times 7?\n\n"));
        assert!(text.contains("\"type\": \"integer\""));
        assert!(
            text.ends_with("Examples of valid responses:\n```json\n42\n```")
        );

        let text = Expectation::new(json!(true)).augment_prompt("Hi");
        assert!(!text.contains("Examples"));
    }

    #[test]
    fn test_validate_reply() {
        let expectation = Expectation::for_type::<Answer>();
        assert_eq!(expectation.schema()["type"], "object");

        let value = expectation
            .validate_reply("```json\n{\"answer\": 42}\n```")
            .unwrap();
        assert_eq!(value, json!({ "answer": 42 }));

        let err = expectation
            .validate_reply("{\"answer\": \"42\"}")
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::InvalidReply { errors } if errors.len() == 1
        ));

        let err = expectation.validate_reply("forty-two").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }
}
