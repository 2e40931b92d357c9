//! Metadata model - immutable descriptors of a settings class's shape
//!
//! Metadata is declared through the builder API and built exactly once per
//! class; `build()` is a pure function of the declaration, so the registry is
//! free to cache the result for the process lifetime. Every structural
//! mistake in a declaration (duplicate names, unresolvable type, missing
//! migrator, ...) fails the build, not the first real request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::contract::{ObjectCodec, ParamType, ParamValue, SettingsError};

use super::forms::FormFieldType;
use super::instance::SettingsObject;

/// Declared enum: ordered case names with their persisted ordinals.
///
/// Substitutes for runtime enum reflection; the enum converter maps between
/// case names and ordinals through this definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    name: String,
    cases: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, cases: &[(&str, i64)]) -> Self {
        Self {
            name: name.into(),
            cases: cases
                .iter()
                .map(|(case, ordinal)| ((*case).to_owned(), *ordinal))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> impl Iterator<Item = (&str, i64)> {
        self.cases.iter().map(|(c, o)| (c.as_str(), *o))
    }

    pub fn ordinal_of(&self, case: &str) -> Option<i64> {
        self.cases.iter().find(|(c, _)| c == case).map(|(_, o)| *o)
    }

    pub fn case_of(&self, ordinal: i64) -> Option<&str> {
        self.cases
            .iter()
            .find(|(_, o)| *o == ordinal)
            .map(|(c, _)| c.as_str())
    }
}

/// Free-form options bag consumed by the parameter's converter
#[derive(Clone, Default)]
pub struct ParameterOptions {
    /// Element type for array parameters
    pub element_type: Option<ParamType>,
    /// Nested options for array elements (arrays of arrays, arrays of enums)
    pub element_options: Option<Box<ParameterOptions>>,
    /// Enum definition for enum parameters
    pub enum_def: Option<Arc<EnumDef>>,
    /// Codec for object parameters
    pub object_codec: Option<Arc<dyn ObjectCodec>>,
    /// Anything else a custom converter may want
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for ParameterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterOptions")
            .field("element_type", &self.element_type)
            .field("element_options", &self.element_options)
            .field("enum_def", &self.enum_def)
            .field("object_codec", &self.object_codec.as_ref().map(|_| "<codec>"))
            .field("extra", &self.extra)
            .finish()
    }
}

/// How an environment-variable binding interacts with stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVarMode {
    /// Env only seeds the parameter when nothing is stored for it
    Initial,
    /// Env always wins at read time; write-back to storage is suppressed
    Overwrite,
    /// Env always wins and the overwritten value is persisted on next save
    OverwritePersist,
}

/// Mapping applied to the raw resolved env value before conversion
#[derive(Clone)]
pub enum ValueMapper {
    /// Arbitrary transformation of the normalized value
    Closure(Arc<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>),
    /// Run the value through another converter type's `to_native`
    Converter(ParamType),
}

impl fmt::Debug for ValueMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("ValueMapper::Closure"),
            Self::Converter(t) => write!(f, "ValueMapper::Converter({t:?})"),
        }
    }
}

/// Environment-variable binding of a parameter
#[derive(Debug, Clone)]
pub struct EnvVarBinding {
    /// Pipe-filter expression, e.g. `"not:bool:APP_FEATURE"`
    pub expression: String,
    pub mode: EnvVarMode,
    pub mapper: Option<ValueMapper>,
}

/// Per-parameter metadata
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    /// Owning settings class
    pub class: String,
    /// Field name on the settings object
    pub property_name: String,
    /// Logical name used in the normalized representation
    pub name: String,
    pub param_type: ParamType,
    pub nullable: bool,
    /// Human-facing label for form rendering
    pub label: Option<String>,
    pub description: Option<String>,
    pub options: ParameterOptions,
    /// Explicit form-rendering type; the form layer guesses one otherwise
    pub form_type: Option<FormFieldType>,
    pub form_options: serde_json::Map<String, serde_json::Value>,
    pub groups: Vec<String>,
    pub env_var: Option<EnvVarBinding>,
    /// Whether object values get an independent copy on clone
    pub cloneable: bool,
    /// Value a fresh instance starts with
    pub default: ParamValue,
}

/// Per-property metadata marking a nested settings class
#[derive(Debug, Clone)]
pub struct EmbeddedSettingsMetadata {
    pub class: String,
    pub property_name: String,
    pub target_class: String,
    /// Group overrides for the embedded subtree
    pub groups: Option<Vec<String>>,
}

/// Hook invoked on a settings object after clone or merge
pub type SettingsHook = Arc<dyn Fn(&mut SettingsObject) + Send + Sync>;

/// Immutable per-class metadata.
///
/// Parameter lookups by logical name and by property name are both O(1);
/// both namespaces are unique within one class.
pub struct SettingsMetadata {
    class_name: String,
    parameters: Vec<Arc<ParameterMetadata>>,
    by_name: HashMap<String, usize>,
    by_property: HashMap<String, usize>,
    embedded: Vec<Arc<EmbeddedSettingsMetadata>>,
    embedded_by_property: HashMap<String, usize>,
    storage_adapter: String,
    storage_key: String,
    version: Option<u32>,
    migrator: Option<String>,
    default_groups: Vec<String>,
    post_clone: Option<SettingsHook>,
    post_merge: Option<SettingsHook>,
}

impl SettingsMetadata {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[Arc<ParameterMetadata>] {
        &self.parameters
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&Arc<ParameterMetadata>> {
        self.by_name.get(name).map(|i| &self.parameters[*i])
    }

    pub fn parameter_by_property(&self, property: &str) -> Option<&Arc<ParameterMetadata>> {
        self.by_property.get(property).map(|i| &self.parameters[*i])
    }

    pub fn embedded(&self) -> &[Arc<EmbeddedSettingsMetadata>] {
        &self.embedded
    }

    pub fn embedded_by_property(&self, property: &str) -> Option<&Arc<EmbeddedSettingsMetadata>> {
        self.embedded_by_property
            .get(property)
            .map(|i| &self.embedded[*i])
    }

    pub fn storage_adapter(&self) -> &str {
        &self.storage_adapter
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Target schema version; `None` means migration is never required
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Identifier of the migrator responsible for this class
    pub fn migrator(&self) -> Option<&str> {
        self.migrator.as_deref()
    }

    pub fn default_groups(&self) -> &[String] {
        &self.default_groups
    }

    pub fn post_clone(&self) -> Option<&SettingsHook> {
        self.post_clone.as_ref()
    }

    pub fn post_merge(&self) -> Option<&SettingsHook> {
        self.post_merge.as_ref()
    }

    /// Base names of the env vars that affect this class's cache key,
    /// sorted and deduplicated.
    pub fn cache_affecting_env_vars(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self
            .parameters
            .iter()
            .filter_map(|p| p.env_var.as_ref())
            .map(|b| super::env::base_name(&b.expression))
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

// ===== Builders =====

/// Declarative manifest of one parameter
pub struct ParameterBuilder {
    property: String,
    name: Option<String>,
    param_type: Option<ParamType>,
    nullable: Option<bool>,
    default: Option<ParamValue>,
    label: Option<String>,
    description: Option<String>,
    options: ParameterOptions,
    form_type: Option<FormFieldType>,
    form_options: serde_json::Map<String, serde_json::Value>,
    groups: Vec<String>,
    env_var: Option<EnvVarBinding>,
    cloneable: bool,
}

impl ParameterBuilder {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            name: None,
            param_type: None,
            nullable: None,
            default: None,
            label: None,
            description: None,
            options: ParameterOptions::default(),
            form_type: None,
            form_options: serde_json::Map::new(),
            groups: Vec::new(),
            env_var: None,
            cloneable: true,
        }
    }

    /// Logical name, if different from the property name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn of_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Element type for array parameters
    pub fn element(mut self, element_type: ParamType) -> Self {
        self.options.element_type = Some(element_type);
        self
    }

    /// Nested element options for array parameters
    pub fn element_options(mut self, options: ParameterOptions) -> Self {
        self.options.element_options = Some(Box::new(options));
        self
    }

    pub fn enum_def(mut self, def: Arc<EnumDef>) -> Self {
        self.options.enum_def = Some(def);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn ObjectCodec>) -> Self {
        self.options.object_codec = Some(codec);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.extra.insert(key.into(), value);
        self
    }

    pub fn form_type(mut self, form_type: FormFieldType) -> Self {
        self.form_type = Some(form_type);
        self
    }

    pub fn form_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.form_options.insert(key.into(), value);
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, expression: impl Into<String>, mode: EnvVarMode) -> Self {
        self.env_var = Some(EnvVarBinding {
            expression: expression.into(),
            mode,
            mapper: None,
        });
        self
    }

    pub fn env_mapped(
        mut self,
        expression: impl Into<String>,
        mode: EnvVarMode,
        mapper: ValueMapper,
    ) -> Self {
        self.env_var = Some(EnvVarBinding {
            expression: expression.into(),
            mode,
            mapper: Some(mapper),
        });
        self
    }

    pub fn cloneable(mut self, cloneable: bool) -> Self {
        self.cloneable = cloneable;
        self
    }

    fn build(self, class: &str) -> Result<ParameterMetadata, SettingsError> {
        let invalid = |details: String| SettingsError::InvalidClass {
            class: class.to_owned(),
            details,
        };

        // Type is explicit or guessed from the declared default value.
        let param_type = match (self.param_type, &self.default) {
            (Some(t), _) => t,
            (None, Some(default)) => infer_type(default).ok_or_else(|| {
                invalid(format!(
                    "cannot infer type of parameter '{}' from its default value",
                    self.property
                ))
            })?,
            (None, None) => {
                return Err(invalid(format!(
                    "parameter '{}' has neither a type nor a default to infer it from",
                    self.property
                )))
            }
        };

        let nullable = match (self.nullable, &self.default) {
            (Some(n), _) => n,
            (None, Some(ParamValue::Null)) | (None, None) => true,
            (None, Some(_)) => false,
        };

        let default = match self.default {
            Some(v) => v,
            None if nullable => ParamValue::Null,
            None => {
                return Err(invalid(format!(
                    "non-nullable parameter '{}' needs a default value",
                    self.property
                )))
            }
        };

        match param_type {
            ParamType::Enum if self.options.enum_def.is_none() => {
                return Err(invalid(format!(
                    "enum parameter '{}' has no enum definition",
                    self.property
                )))
            }
            ParamType::Array if self.options.element_type.is_none() => {
                return Err(invalid(format!(
                    "array parameter '{}' declares no element type",
                    self.property
                )))
            }
            ParamType::Object if self.options.object_codec.is_none() => {
                return Err(invalid(format!(
                    "object parameter '{}' has no codec",
                    self.property
                )))
            }
            _ => {}
        }

        Ok(ParameterMetadata {
            class: class.to_owned(),
            name: self.name.unwrap_or_else(|| self.property.clone()),
            property_name: self.property,
            param_type,
            nullable,
            label: self.label,
            description: self.description,
            options: self.options,
            form_type: self.form_type,
            form_options: self.form_options,
            groups: self.groups,
            env_var: self.env_var,
            cloneable: self.cloneable,
            default,
        })
    }
}

/// Declarative manifest of one embedded settings property
pub struct EmbeddedBuilder {
    property: String,
    target: Option<String>,
    groups: Option<Vec<String>>,
}

impl EmbeddedBuilder {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            target: None,
            groups: None,
        }
    }

    pub fn target(mut self, class: impl Into<String>) -> Self {
        self.target = Some(class.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    fn build(self, class: &str) -> Result<EmbeddedSettingsMetadata, SettingsError> {
        let target_class = self.target.ok_or_else(|| SettingsError::InvalidClass {
            class: class.to_owned(),
            details: format!("embedded property '{}' declares no target class", self.property),
        })?;
        Ok(EmbeddedSettingsMetadata {
            class: class.to_owned(),
            property_name: self.property,
            target_class,
            groups: self.groups,
        })
    }
}

/// Declarative manifest of a settings class
pub struct SettingsClassBuilder {
    name: String,
    storage_adapter: Option<String>,
    storage_key: Option<String>,
    version: Option<u32>,
    migrator: Option<String>,
    default_groups: Vec<String>,
    parameters: Vec<ParameterBuilder>,
    embedded: Vec<EmbeddedBuilder>,
    post_clone: Option<SettingsHook>,
    post_merge: Option<SettingsHook>,
}

impl SettingsClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_adapter: None,
            storage_key: None,
            version: None,
            migrator: None,
            default_groups: Vec::new(),
            parameters: Vec::new(),
            embedded: Vec::new(),
            post_clone: None,
            post_merge: None,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.name
    }

    pub fn storage(mut self, adapter_id: impl Into<String>) -> Self {
        self.storage_adapter = Some(adapter_id.into());
        self
    }

    /// Storage key; defaults to the class name
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Declare the target schema version and the migrator responsible for
    /// reaching it
    pub fn version(mut self, version: u32, migrator: impl Into<String>) -> Self {
        self.version = Some(version);
        self.migrator = Some(migrator.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameter(mut self, parameter: ParameterBuilder) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn embed(mut self, embedded: EmbeddedBuilder) -> Self {
        self.embedded.push(embedded);
        self
    }

    pub fn on_cloned(mut self, hook: SettingsHook) -> Self {
        self.post_clone = Some(hook);
        self
    }

    pub fn on_merged(mut self, hook: SettingsHook) -> Self {
        self.post_merge = Some(hook);
        self
    }

    /// Build the immutable metadata, failing on any structural mistake
    pub fn build(self, default_storage_adapter: &str) -> Result<SettingsMetadata, SettingsError> {
        let class = self.name;
        let invalid = |details: String| SettingsError::InvalidClass {
            class: class.clone(),
            details,
        };

        let mut parameters = Vec::with_capacity(self.parameters.len());
        let mut by_name = HashMap::new();
        let mut by_property = HashMap::new();
        for builder in self.parameters {
            let parameter = builder.build(&class)?;
            let index = parameters.len();
            if by_name.insert(parameter.name.clone(), index).is_some() {
                return Err(invalid(format!("duplicate parameter name '{}'", parameter.name)));
            }
            if by_property
                .insert(parameter.property_name.clone(), index)
                .is_some()
            {
                return Err(invalid(format!(
                    "duplicate parameter property '{}'",
                    parameter.property_name
                )));
            }
            parameters.push(Arc::new(parameter));
        }

        let mut embedded = Vec::with_capacity(self.embedded.len());
        let mut embedded_by_property = HashMap::new();
        for builder in self.embedded {
            let embed = builder.build(&class)?;
            // A property is a parameter or an embed, never both.
            if by_property.contains_key(&embed.property_name) {
                return Err(invalid(format!(
                    "property '{}' is declared as both parameter and embed",
                    embed.property_name
                )));
            }
            let index = embedded.len();
            if embedded_by_property
                .insert(embed.property_name.clone(), index)
                .is_some()
            {
                return Err(invalid(format!(
                    "duplicate embedded property '{}'",
                    embed.property_name
                )));
            }
            embedded.push(Arc::new(embed));
        }

        if self.version.is_some() && self.migrator.is_none() {
            return Err(invalid("class declares a version but no migrator".to_owned()));
        }

        Ok(SettingsMetadata {
            storage_adapter: self
                .storage_adapter
                .unwrap_or_else(|| default_storage_adapter.to_owned()),
            storage_key: self.storage_key.unwrap_or_else(|| class.clone()),
            class_name: class,
            parameters,
            by_name,
            by_property,
            embedded,
            embedded_by_property,
            version: self.version,
            migrator: self.migrator,
            default_groups: self.default_groups,
            post_clone: self.post_clone,
            post_merge: self.post_merge,
        })
    }
}

fn infer_type(value: &ParamValue) -> Option<ParamType> {
    match value {
        ParamValue::Bool(_) => Some(ParamType::Bool),
        ParamValue::Int(_) => Some(ParamType::Int),
        ParamValue::Float(_) => Some(ParamType::Float),
        ParamValue::Str(_) => Some(ParamType::String),
        ParamValue::DateTime(_) => Some(ParamType::DateTime),
        // Enum, array and object declarations carry mandatory options, so a
        // bare default cannot stand in for the type.
        ParamValue::Null
        | ParamValue::EnumCase(_)
        | ParamValue::Array(_)
        | ParamValue::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: SettingsClassBuilder) -> Result<SettingsMetadata, SettingsError> {
        builder.build("memory")
    }

    #[test]
    fn type_is_inferred_from_default() {
        let meta = build(
            SettingsClassBuilder::new("Test")
                .parameter(ParameterBuilder::new("flag").default(true))
                .parameter(ParameterBuilder::new("count").default(5))
                .parameter(ParameterBuilder::new("ratio").default(0.5))
                .parameter(ParameterBuilder::new("label").default("hi")),
        )
        .unwrap();

        let types: Vec<ParamType> = meta.parameters().iter().map(|p| p.param_type).collect();
        assert_eq!(
            types,
            vec![ParamType::Bool, ParamType::Int, ParamType::Float, ParamType::String]
        );
        for p in meta.parameters() {
            assert!(!p.nullable);
        }
    }

    #[test]
    fn unguessable_type_fails_the_build() {
        let result = build(
            SettingsClassBuilder::new("Test").parameter(ParameterBuilder::new("mystery")),
        );
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));

        let result = build(SettingsClassBuilder::new("Test").parameter(
            ParameterBuilder::new("mystery").default(ParamValue::Null),
        ));
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn null_default_with_explicit_type_is_nullable() {
        let meta = build(SettingsClassBuilder::new("Test").parameter(
            ParameterBuilder::new("value2").of_type(ParamType::Int).default(ParamValue::Null),
        ))
        .unwrap();

        let p = meta.parameter_by_name("value2").unwrap();
        assert!(p.nullable);
        assert_eq!(p.default, ParamValue::Null);
    }

    #[test]
    fn duplicate_names_fail_the_build() {
        let result = build(
            SettingsClassBuilder::new("Test")
                .parameter(ParameterBuilder::new("a").default(1))
                .parameter(ParameterBuilder::new("b").name("a").default(2)),
        );
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));

        let result = build(
            SettingsClassBuilder::new("Test")
                .parameter(ParameterBuilder::new("a").default(1))
                .parameter(ParameterBuilder::new("a").default(2)),
        );
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn parameter_and_embed_cannot_share_a_property() {
        let result = build(
            SettingsClassBuilder::new("Test")
                .parameter(ParameterBuilder::new("sub").default(1))
                .embed(EmbeddedBuilder::new("sub").target("Other")),
        );
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn embed_without_target_fails_the_build() {
        let result =
            build(SettingsClassBuilder::new("Test").embed(EmbeddedBuilder::new("sub")));
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn enum_parameter_requires_a_definition() {
        let result = build(SettingsClassBuilder::new("Test").parameter(
            ParameterBuilder::new("mode").of_type(ParamType::Enum).default(ParamValue::Null),
        ));
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn storage_key_defaults_to_class_name() {
        let meta = build(SettingsClassBuilder::new("WebsiteSettings")).unwrap();
        assert_eq!(meta.storage_key(), "WebsiteSettings");
        assert_eq!(meta.storage_adapter(), "memory");

        let meta = SettingsClassBuilder::new("WebsiteSettings")
            .storage_key("website")
            .storage("json_file")
            .build("memory")
            .unwrap();
        assert_eq!(meta.storage_key(), "website");
        assert_eq!(meta.storage_adapter(), "json_file");
    }

    #[test]
    fn lookups_work_by_both_names() {
        let meta = build(SettingsClassBuilder::new("Test").parameter(
            ParameterBuilder::new("my_property").name("myParam").default(1),
        ))
        .unwrap();

        assert!(meta.parameter_by_name("myParam").is_some());
        assert!(meta.parameter_by_property("my_property").is_some());
        assert!(meta.parameter_by_name("my_property").is_none());
        assert!(meta.parameter_by_property("myParam").is_none());
    }

    #[test]
    fn cache_affecting_env_vars_are_sorted_base_names() {
        let meta = build(
            SettingsClassBuilder::new("Test")
                .parameter(
                    ParameterBuilder::new("b").default(true).env("not:bool:ZULU", EnvVarMode::Overwrite),
                )
                .parameter(
                    ParameterBuilder::new("a").default(1).env("int:ALPHA", EnvVarMode::Initial),
                )
                .parameter(ParameterBuilder::new("c").default("x")),
        )
        .unwrap();

        assert_eq!(meta.cache_affecting_env_vars(), vec!["ALPHA", "ZULU"]);
    }
}
