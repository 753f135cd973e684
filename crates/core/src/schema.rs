use jsonschema::JSONSchema;
use schemars::JsonSchema;
use serde_json::Value;

/// Generates a JSON schema for `T`, suitable as function parameters or as
/// an expectation.
///
/// The `$schema` keyword is left out, providers don't need it.
pub fn schema_for<T: JsonSchema>() -> Value {
    let mut schema = schemars::schema_for!(T).to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

/// Checks `instance` against `schema`, returning one message per
/// violation.
pub(crate) fn validate(
    schema: &Value,
    instance: &Value,
) -> Result<(), Vec<String>> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|err| vec![format!("invalid schema: {err}")])?;

    if let Err(errors) = compiled.validate(instance) {
        return Err(errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Weather {
        location: String,
        unit: Option<String>,
    }

    #[test]
    fn test_schema_for() {
        let schema = schema_for::<Weather>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["location"]));
        assert!(schema.get("$schema").is_none());
        assert!(validate(&schema, &json!({ "location": "Paris" })).is_ok());
    }

    #[test]
    fn test_violations() {
        let schema = json!({
            "type": "object",
            "properties": {
                "location": { "type": "string" },
                "days": { "type": "integer", "minimum": 1 }
            },
            "required": ["location"]
        });

        let errors = validate(&schema, &json!({ "days": 0 })).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("location")));
        assert!(errors.iter().any(|e| e.starts_with("/days")));
    }

    #[test]
    fn test_invalid_schema() {
        let schema = json!({ "type": "no-such-type" });
        let errors = validate(&schema, &json!({})).unwrap_err();
        assert!(errors[0].starts_with("invalid schema"));
    }
}
