//! Form-builder contract
//!
//! The engine does not render anything. It exposes, per parameter, a default
//! input type plus pre-filled field options that a form-rendering collaborator
//! consumes. An explicit `form_type` on the parameter wins over the guess.

use serde_json::{json, Value};

use crate::contract::ParamType;

use super::metadata::ParameterMetadata;

/// UI input types the form layer understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormFieldType {
    Checkbox,
    Number,
    Text,
    DateTimeLocal,
    Select,
    Collection,
    /// Identifier the form layer resolves on its own
    Custom(String),
}

/// Rendering instructions for a single parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub field_type: FormFieldType,
    pub options: serde_json::Map<String, Value>,
}

fn entry_type_name(element: ParamType) -> &'static str {
    match element {
        ParamType::Bool => "checkbox",
        ParamType::Int | ParamType::Float => "number",
        ParamType::String => "text",
        ParamType::DateTime => "datetime-local",
        ParamType::Enum => "select",
        ParamType::Array => "collection",
        ParamType::Object => "object",
    }
}

fn default_field_type(meta: &ParameterMetadata) -> FormFieldType {
    match meta.param_type {
        ParamType::Bool => FormFieldType::Checkbox,
        ParamType::Int | ParamType::Float => FormFieldType::Number,
        ParamType::String => FormFieldType::Text,
        ParamType::DateTime => FormFieldType::DateTimeLocal,
        ParamType::Enum => FormFieldType::Select,
        ParamType::Array => FormFieldType::Collection,
        ParamType::Object => FormFieldType::Custom("object".to_owned()),
    }
}

/// Build the default form field for a parameter.
///
/// Label, description and nullability fold into the options map; enum
/// parameters get a `choices` map of case name to ordinal. Explicit
/// `form_options` on the parameter are merged last and override the defaults.
pub fn form_field_for(meta: &ParameterMetadata) -> FormField {
    let field_type = meta
        .form_type
        .clone()
        .unwrap_or_else(|| default_field_type(meta));

    let mut options = serde_json::Map::new();
    options.insert(
        "label".to_owned(),
        json!(meta.label.clone().unwrap_or_else(|| meta.name.clone())),
    );
    if let Some(description) = &meta.description {
        options.insert("help".to_owned(), json!(description));
    }
    options.insert("required".to_owned(), json!(!meta.nullable));

    if field_type == FormFieldType::Select {
        if let Some(def) = &meta.options.enum_def {
            let choices: serde_json::Map<String, Value> = def
                .cases()
                .map(|(case, ordinal)| (case.to_owned(), json!(ordinal)))
                .collect();
            options.insert("choices".to_owned(), Value::Object(choices));
        }
    }
    if field_type == FormFieldType::Collection {
        if let Some(element) = meta.options.element_type {
            options.insert("entry_type".to_owned(), json!(entry_type_name(element)));
        }
    }

    for (key, value) in &meta.form_options {
        options.insert(key.clone(), value.clone());
    }

    FormField {
        name: meta.name.clone(),
        field_type,
        options,
    }
}
