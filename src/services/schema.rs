use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{Map, Value};

use crate::core::state::{Analysis, Idea, Script};

/// JSON Schema of the value a model is asked to produce, derived from the artifact type.
///
/// Subschemas are inlined because none of the model APIs resolve `$ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    json: Value,
}

impl ResponseSchema {
    pub fn of<T: JsonSchema>() -> Self {
        let schema = SchemaSettings::draft2020_12()
            .with(|s| s.inline_subschemas = true)
            .into_generator()
            .into_root_schema_for::<T>();
        Self {
            json: schema.to_value(),
        }
    }

    pub fn json_schema(&self) -> &Value {
        &self.json
    }

    pub fn is_object(&self) -> bool {
        self.json.get("type").and_then(Value::as_str) == Some("object")
    }

    /// Gemini `responseSchema` form: the OpenAPI subset with upper-case type names.
    pub fn to_gemini(&self) -> Value {
        gemini_node(&self.json)
    }

    /// Form accepted by OpenAI strict structured outputs: closed objects, no annotations.
    pub fn to_strict(&self) -> Value {
        let mut json = self.json.clone();
        strict_node(&mut json);
        json
    }

    /// Checks `value` against the schema, describing the first violation with its location.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let validator = jsonschema::validator_for(&self.json)
            .map_err(|e| format!("invalid response schema: {}", e))?;

        let result = match validator.iter_errors(value).next() {
            None => Ok(()),
            Some(error) => {
                let location = error.instance_path().to_string();
                if location.is_empty() {
                    Err(error.to_string())
                } else {
                    Err(format!("{}: {}", location, error))
                }
            }
        };
        result
    }
}

fn gemini_node(node: &Value) -> Value {
    let Some(object) = node.as_object() else {
        return node.clone();
    };

    let mut out = Map::new();
    if let Some(kind) = object.get("type").and_then(Value::as_str) {
        out.insert("type".to_string(), Value::String(kind.to_uppercase()));
    }
    if let Some(items) = object.get("items") {
        out.insert("items".to_string(), gemini_node(items));
    }
    if let Some(properties) = object.get("properties").and_then(Value::as_object) {
        let ordering = properties.keys().cloned().map(Value::String).collect();
        let converted = properties
            .iter()
            .map(|(name, child)| (name.clone(), gemini_node(child)))
            .collect();
        out.insert("properties".to_string(), Value::Object(converted));
        out.insert("propertyOrdering".to_string(), Value::Array(ordering));
    }
    for key in ["required", "minItems", "description"] {
        if let Some(value) = object.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

fn strict_node(node: &mut Value) {
    let Some(object) = node.as_object_mut() else {
        return;
    };

    for key in ["$schema", "title", "format"] {
        object.remove(key);
    }
    if object.get("type").and_then(Value::as_str) == Some("object") {
        object.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    if let Some(items) = object.get_mut("items") {
        strict_node(items);
    }
    if let Some(Value::Object(properties)) = object.get_mut("properties") {
        for child in properties.values_mut() {
            strict_node(child);
        }
    }
}

pub fn analysis_schema() -> ResponseSchema {
    ResponseSchema::of::<Analysis>()
}

pub fn ideas_schema() -> ResponseSchema {
    ResponseSchema::of::<Vec<Idea>>()
}

pub fn script_schema() -> ResponseSchema {
    ResponseSchema::of::<Script>()
}
