//! Schema descriptors for structured collections.
//!
//! A descriptor tells the translator what the collection looks like: field
//! names and stored types, which fields need a cast before numeric
//! comparison, free-text notes and worked examples. Descriptors are
//! read-only after loading and shared behind an `Arc`.

use crate::pipeline::{CastOp, StructuredQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sewana_core::{AppError, AppResult};
use std::collections::HashSet;
use std::path::Path;

const DOCTORS_SCHEMA: &str = include_str!("../schemas/doctors.yaml");

/// Stored type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One field of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub description: String,

    /// Cast operator required before numeric comparisons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<CastOp>,

    /// Element type of scalar arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldType>,

    /// Nested fields of objects and arrays of objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
}

/// A worked question-to-pipeline example shown to the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExample {
    pub intent: String,
    pub pipeline: StructuredQuery,
}

/// Description of a structured collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub collection: String,

    #[serde(default)]
    pub description: String,

    pub fields: Vec<FieldSpec>,

    #[serde(default)]
    pub notes: Vec<String>,

    #[serde(default)]
    pub examples: Vec<QueryExample>,
}

impl SchemaDescriptor {
    /// The built-in descriptor for the `doctors` collection.
    pub fn doctors() -> AppResult<Self> {
        Self::from_yaml_str(DOCTORS_SCHEMA)
    }

    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        let descriptor: SchemaDescriptor = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Config(format!("Invalid schema descriptor: {}", e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read schema file {:?}: {}", path, e))
        })?;
        tracing::debug!("Loaded schema descriptor from {:?}", path);
        Self::from_yaml_str(&contents)
    }

    fn validate(&self) -> AppResult<()> {
        if self.collection.trim().is_empty() {
            return Err(AppError::Config(
                "Schema descriptor must name a collection".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(AppError::Config(format!(
                "Schema for '{}' declares no fields",
                self.collection
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate field '{}' in schema for '{}'",
                    field.name, self.collection
                )));
            }
        }
        Ok(())
    }

    /// Field shape as indented JSON, with type names as values.
    pub fn render_shape(&self) -> String {
        let shape = shape_of(&self.fields);
        serde_json::to_string_pretty(&shape).unwrap_or_default()
    }

    /// Numbered field descriptions, cast requirements and notes.
    pub fn render_description(&self) -> String {
        let mut out = String::new();
        if !self.description.is_empty() {
            out.push_str(&self.description);
            out.push_str("\n\n");
        }

        for (index, field) in self.fields.iter().enumerate() {
            out.push_str(&format!("{}. {}:\n", index + 1, field.name));
            describe_field(field, &field.name, 1, &mut out);
        }

        if !self.notes.is_empty() {
            out.push_str("\nNotes:\n");
            for note in &self.notes {
                out.push_str(&format!("- {}\n", note));
            }
        }
        out
    }

    /// Dotted paths of every field that needs a cast, with the cast.
    pub fn cast_fields(&self) -> Vec<(String, CastOp)> {
        let mut out = Vec::new();
        collect_casts(&self.fields, "", &mut out);
        out
    }
}

/// Render examples as an intent comment followed by the pipeline.
pub fn render_examples(examples: &[QueryExample]) -> String {
    examples
        .iter()
        .map(|example| format!("// {}\n{}", example.intent, example.pipeline.to_pretty_json()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn shape_of(fields: &[FieldSpec]) -> Value {
    let mut map = Map::new();
    for field in fields {
        let value = match field.field_type {
            FieldType::Object => shape_of(&field.fields),
            FieldType::Array if !field.fields.is_empty() => {
                Value::Array(vec![shape_of(&field.fields)])
            }
            FieldType::Array => Value::Array(vec![Value::String(
                field.items.unwrap_or(FieldType::String).as_str().to_string(),
            )]),
            other => Value::String(other.as_str().to_string()),
        };
        map.insert(field.name.clone(), value);
    }
    Value::Object(map)
}

fn describe_field(field: &FieldSpec, path: &str, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    if !field.description.is_empty() {
        out.push_str(&format!("{}- {}\n", indent, field.description));
    }
    if let Some(cast) = field.cast {
        out.push_str(&format!(
            "{}- IMPORTANT: stored as {}. Always convert {} to a number using {} before numeric comparisons.\n",
            indent,
            field.field_type.as_str(),
            path,
            cast.as_str()
        ));
    }
    if !field.fields.is_empty() {
        out.push_str(&format!("{}- Fields:\n", indent));
        for nested in &field.fields {
            let nested_path = format!("{}.{}", path, nested.name);
            out.push_str(&format!("{}  - {}:\n", indent, nested.name));
            describe_field(nested, &nested_path, depth + 1, out);
        }
    }
}

fn collect_casts(fields: &[FieldSpec], prefix: &str, out: &mut Vec<(String, CastOp)>) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };
        if let Some(cast) = field.cast {
            out.push((path.clone(), cast));
        }
        collect_casts(&field.fields, &path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_doctors_schema() {
        let schema = SchemaDescriptor::doctors().unwrap();
        assert_eq!(schema.collection, "doctors");
        assert_eq!(schema.examples.len(), 4);
        assert!(schema.fields.iter().any(|f| f.name == "availability"));
    }

    #[test]
    fn test_cast_fields() {
        let schema = SchemaDescriptor::doctors().unwrap();
        let casts = schema.cast_fields();
        assert!(casts.contains(&("consultation_fee".to_string(), CastOp::ToInt)));
        assert!(casts.contains(&("ratings".to_string(), CastOp::ToDouble)));
    }

    #[test]
    fn test_render_shape_nests_objects_and_arrays() {
        let schema = SchemaDescriptor::doctors().unwrap();
        let shape: Value = serde_json::from_str(&schema.render_shape()).unwrap();
        assert_eq!(shape["contact"]["email"], "string");
        assert_eq!(shape["availability"][0]["time_slots"][0], "string");
        assert_eq!(shape["languages"][0], "string");
    }

    #[test]
    fn test_render_description_mentions_casts() {
        let schema = SchemaDescriptor::doctors().unwrap();
        let text = schema.render_description();
        assert!(text.contains("12. consultation_fee:"));
        assert!(text.contains("convert consultation_fee to a number using $toInt"));
        assert!(text.contains("convert ratings to a number using $toDouble"));
        assert!(text.contains("Notes:"));
    }

    #[test]
    fn test_render_examples_has_intent_comments() {
        let schema = SchemaDescriptor::doctors().unwrap();
        let text = render_examples(&schema.examples);
        assert!(text.starts_with("// Find all cardiologists"));
        assert!(text.contains("\"$toInt\": \"$consultation_fee\""));
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let yaml = r#"
collection: wards
fields:
  - { name: ward, type: string }
  - { name: ward, type: number }
"#;
        assert!(matches!(
            SchemaDescriptor::from_yaml_str(yaml),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "collection: wards\nfields:\n  - {{ name: beds, type: string, cast: $toInt }}"
        )
        .unwrap();

        let schema = SchemaDescriptor::load(file.path()).unwrap();
        assert_eq!(schema.collection, "wards");
        assert_eq!(schema.cast_fields()[0].1, CastOp::ToInt);
    }
}
