//! Schema-conformance collaborator.
//!
//! The validator only asks "does this instance satisfy this schema"; the
//! answer comes from a [`SchemaValidator`]. The stock document schema is
//! embedded at build time.

use crate::core::error::ProvcheckError;
use rust_embed::RustEmbed;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(RustEmbed)]
#[folder = "assets/"]
#[include = "*.json"]
pub struct Assets;

pub const DEFAULT_SCHEMA_NAME: &str = "transcript.schema.json";

pub trait SchemaValidator: Send + Sync {
    /// `Err` carries one human-readable reason per violation.
    fn check(&self, schema: &Value, instance: &Value) -> Result<(), Vec<String>>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn check(&self, schema: &Value, instance: &Value) -> Result<(), Vec<String>> {
        let validator = match jsonschema::validator_for(schema) {
            Ok(v) => v,
            Err(e) => return Err(vec![format!("schema is not usable: {e}")]),
        };
        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| format!("{e}"))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub fn default_schema_text() -> Result<String, ProvcheckError> {
    let file = Assets::get(DEFAULT_SCHEMA_NAME).ok_or_else(|| {
        ProvcheckError::NotFound(format!("embedded asset {}", DEFAULT_SCHEMA_NAME))
    })?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| ProvcheckError::SchemaError(format!("embedded schema is not UTF-8: {}", e)))
}

pub fn default_schema() -> Result<Value, ProvcheckError> {
    Ok(serde_json::from_str(&default_schema_text()?)?)
}

/// Load a schema document from disk, or the embedded default, and make
/// sure it compiles before any transcript is checked against it.
pub fn load_schema(path: Option<&Path>) -> Result<Value, ProvcheckError> {
    let schema = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ProvcheckError::NotFound(format!(
                    "schema file {}",
                    path.display()
                )));
            }
            serde_json::from_str(&fs::read_to_string(path)?)?
        }
        None => default_schema()?,
    };
    jsonschema::validator_for(&schema)
        .map_err(|e| ProvcheckError::SchemaError(format!("invalid schema document: {e}")))?;
    Ok(schema)
}
