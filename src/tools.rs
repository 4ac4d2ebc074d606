//! # Tool specifications
//!
//! A [`ToolSpec`] describes a caller-supplied function the model may call: a name,
//! a description and a JSON Schema for its parameters. The SDK never executes
//! tools; it only advertises them in the request and reports the model's calls
//! back as [`crate::NormalizedEvent::ToolCallDelta`] events.
//!
//! ## Schema Conversion
//!
//! Three input notations are accepted and normalized to a full JSON Schema object:
//!
//! - **Simple notation**: `{"path": "string", "limit": "integer"}`
//! - **Extended notation**: `{"path": {"type": "string", "description": "...", "optional": true}}`
//! - **Full JSON Schema**: anything that already has `"type"` and `"properties"`
//!
//! ## Example
//!
//! ```rust
//! use flowchat::tool;
//!
//! let read_file = tool("read_file", "Read the contents of a workspace file")
//!     .param("target_file", "string")
//!     .optional_param("start_line", "integer")
//!     .build();
//!
//! let wire = read_file.to_wire_format();
//! assert_eq!(wire["type"], "function");
//! assert_eq!(wire["function"]["name"], "read_file");
//! assert_eq!(wire["function"]["parameters"]["required"][0], "target_file");
//! ```

use serde_json::{Map, Value, json};

/// A tool the model may request, in vendor-neutral form.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    name: String,
    description: String,
    parameters: Value,
}

impl ToolSpec {
    /// Create a tool spec, normalizing `schema` to a full JSON Schema object.
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: convert_schema(schema),
        }
    }

    /// The `{"type":"function","function":{...}}` object sent in the `tools` array.
    pub fn to_wire_format(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Normalized JSON Schema of the parameters.
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

/// Normalize a parameter schema to `{"type":"object","properties":{..},"required":[..]}`.
///
/// Simple type strings are required. Extended entries are required unless they
/// carry `"optional": true`, `"required": false`, or a `"default"`; the
/// non-standard `optional`/`required` flags are stripped from the output.
fn convert_schema(schema: Value) -> Value {
    let Value::Object(obj) = schema else {
        return json!({"type": "object", "properties": {}, "required": []});
    };

    if obj.contains_key("type") && obj.contains_key("properties") {
        return Value::Object(obj);
    }

    let mut properties = Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        match param_type {
            Value::String(type_str) => {
                properties.insert(param_name.clone(), type_to_json_schema(&type_str));
                required.push(Value::String(param_name));
            }
            Value::Object(mut prop) => {
                let is_optional = prop
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop.remove("required").and_then(|v| v.as_bool());
                let has_default = prop.contains_key("default");

                properties.insert(param_name.clone(), Value::Object(prop));

                let mark_required = match is_required {
                    Some(flag) => flag,
                    None => !is_optional && !has_default,
                };
                if mark_required {
                    required.push(Value::String(param_name));
                }
            }
            // Arrays, numbers and the like carry no usable type information
            _ => {}
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "str" | "string" => "string",
        "int" | "integer" => "integer",
        "float" | "number" => "number",
        "bool" | "boolean" => "boolean",
        "list" | "array" => "array",
        "dict" | "object" => "object",
        _ => "string",
    };
    json!({"type": json_type})
}

/// Builder for [`ToolSpec`]
///
/// Use either `.schema()` or the `.param()` family, not both: `.schema()` replaces
/// everything added so far, and `.param()` resets a non-object schema.
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({}),
        }
    }

    /// Replace the schema entirely (any of the accepted notations).
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add a required parameter with a simple type string.
    pub fn param(self, name: &str, type_str: &str) -> Self {
        self.insert(name, Value::String(type_str.to_string()))
    }

    /// Add an optional parameter with a simple type string.
    pub fn optional_param(self, name: &str, type_str: &str) -> Self {
        let mut prop = type_to_json_schema(type_str);
        if let Value::Object(obj) = &mut prop {
            obj.insert("optional".to_string(), Value::Bool(true));
        }
        self.insert(name, prop)
    }

    fn insert(mut self, name: &str, value: Value) -> Self {
        if !self.schema.is_object() {
            self.schema = json!({});
        }
        if let Value::Object(obj) = &mut self.schema {
            obj.insert(name.to_string(), value);
        }
        self
    }

    pub fn build(self) -> ToolSpec {
        ToolSpec::new(self.name, self.description, self.schema)
    }
}

/// Start building a [`ToolSpec`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_notation_marks_all_required() {
        let spec = ToolSpec::new(
            "grep_search",
            "Search files with a regex",
            json!({"query": "string", "case_sensitive": "bool"}),
        );

        let params = spec.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["query"]["type"], "string");
        assert_eq!(params["properties"]["case_sensitive"]["type"], "boolean");
        assert_eq!(params["required"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_full_schema_passes_through() {
        let schema = json!({
            "type": "object",
            "properties": {"target_file": {"type": "string"}},
            "required": ["target_file"]
        });
        let spec = ToolSpec::new("read_file", "Read a file", schema.clone());
        assert_eq!(spec.parameters(), &schema);
    }

    #[test]
    fn test_extended_notation_optional_and_default() {
        let spec = ToolSpec::new(
            "list_dir",
            "List a directory",
            json!({
                "path": {"type": "string", "description": "Directory"},
                "depth": {"type": "integer", "default": 1},
                "hidden": {"type": "boolean", "optional": true},
                "sort": {"type": "string", "required": true, "default": "name"}
            }),
        );

        let required: Vec<&str> = spec.parameters()["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"path"));
        assert!(required.contains(&"sort"));
        assert!(!required.contains(&"depth"));
        assert!(!required.contains(&"hidden"));
        assert!(spec.parameters()["properties"]["hidden"].get("optional").is_none());
    }

    #[test]
    fn test_non_object_schema_becomes_empty_object() {
        let spec = ToolSpec::new("noop", "Does nothing", json!("nonsense"));
        assert_eq!(spec.parameters()["type"], "object");
        assert!(spec.parameters()["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_builder_wire_format() {
        let spec = tool("file_search", "Fuzzy search for file paths")
            .param("query", "string")
            .optional_param("explanation", "string")
            .build();

        let wire = spec.to_wire_format();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "file_search");
        assert_eq!(wire["function"]["description"], "Fuzzy search for file paths");
        assert_eq!(wire["function"]["parameters"]["required"], json!(["query"]));
    }

    #[test]
    fn test_param_after_non_object_schema_resets() {
        let spec = tool("t", "d").schema(json!(42)).param("x", "number").build();
        assert_eq!(spec.parameters()["properties"]["x"]["type"], "number");
    }
}
