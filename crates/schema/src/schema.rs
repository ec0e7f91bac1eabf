use serde_yaml::{Mapping, Value};
use std::fmt::Write as _;

/// Bucket used by a value map when the target field is absent.
pub const DEFAULT_BUCKET: &str = "default";

/// Errors raised while compiling a schema description.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("schema must be a mapping of field rules")]
    NotAMapping,
    #[error("rule for field `{0}` must be a mapping")]
    InvalidRule(String),
    #[error("field `{field}`: `optional` must be a boolean or \"useDefault\", got {found:?}")]
    InvalidOptional { field: String, found: Value },
}

/// A failed validation. Fatal to the load that triggered it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (key `{key}`){}", describe(.found, .expected))]
pub struct ValidationError {
    pub key: String,
    pub message: String,
    pub found: Option<Value>,
    pub expected: Option<Value>,
}

impl ValidationError {
    fn new(key: &str, message: &str, found: Option<Value>, expected: Option<Value>) -> Self {
        Self {
            key: key.to_owned(),
            message: message.to_owned(),
            found,
            expected,
        }
    }
}

fn describe(found: &Option<Value>, expected: &Option<Value>) -> String {
    let mut out = String::new();
    if let Some(found) = found {
        let _ = write!(out, "; given {}", inline(found));
    }
    if let Some(expected) = expected {
        let _ = write!(out, "; required {}", inline(expected));
    }
    out
}

fn inline(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().replace('\n', " "))
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// Runtime type name used by `valueType` / `valueTypes` rules.
///
/// Arrays report `array`. Non-empty mappings report
/// `object[<type of first value>]`, which is best effort only.
pub fn value_type(value: &Value) -> String {
    match value {
        Value::Mapping(map) => match map.values().next() {
            Some(first) => format!("object[{}]", shallow_type(first)),
            None => "object".into(),
        },
        other => shallow_type(other).into(),
    }
}

fn shallow_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(tagged) => shallow_type(&tagged.value),
    }
}

/// A rule value: either a literal or a map keyed on another field.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Literal(Value),
    Map { target: String, values: Mapping },
}

impl RuleValue {
    fn parse(value: Value) -> Self {
        if let Value::Mapping(map) = &value {
            let target = map.get("target").and_then(Value::as_str);
            let values = map.get("values").and_then(Value::as_mapping);
            if let (Some(target), Some(values)) = (target, values) {
                return RuleValue::Map {
                    target: target.to_owned(),
                    values: values.clone(),
                };
            }
        }
        RuleValue::Literal(value)
    }

    /// Resolve against the object being validated.
    ///
    /// A value map reads `target` off the object; an absent field or a bucket
    /// with no entry selects the `default` bucket.
    pub fn resolve(&self, object: &Mapping) -> Option<Value> {
        match self {
            RuleValue::Literal(value) => Some(value.clone()),
            RuleValue::Map { target, values } => {
                let bucket = object
                    .get(target.as_str())
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::String(DEFAULT_BUCKET.into()));
                values
                    .get(&bucket)
                    .or_else(|| values.get(DEFAULT_BUCKET))
                    .cloned()
            }
        }
    }
}

/// Presence policy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    #[default]
    Required,
    Optional,
    /// Write the resolved default into the object, fail when none resolves.
    UseDefault,
}

/// Rules for one field of a config object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub key: String,
    pub value: Option<RuleValue>,
    pub values: Option<RuleValue>,
    pub value_type: Option<RuleValue>,
    pub value_types: Option<RuleValue>,
    pub default: Option<RuleValue>,
    pub presence: Presence,
}

impl FieldRule {
    fn parse(key: String, rule: &Mapping) -> Result<Self, SchemaError> {
        let get = |name: &str| rule.get(name).cloned().map(RuleValue::parse);
        let presence = match rule.get("optional") {
            None | Some(Value::Bool(false)) => Presence::Required,
            Some(Value::Bool(true)) => Presence::Optional,
            Some(Value::String(s)) if s == "useDefault" => Presence::UseDefault,
            Some(other) => {
                return Err(SchemaError::InvalidOptional {
                    field: key,
                    found: other.clone(),
                });
            }
        };
        Ok(Self {
            value: get("value"),
            values: get("values"),
            value_type: get("valueType"),
            value_types: get("valueTypes"),
            default: get("default"),
            presence,
            key,
        })
    }

    fn validate(&self, object: &mut Mapping) -> Result<(), ValidationError> {
        if !self.validate_presence(object)? {
            return Ok(());
        }
        let Some(found) = object.get(self.key.as_str()) else {
            return Ok(());
        };
        self.validate_value(object, found)?;
        self.validate_type(object, found)
    }

    /// Returns whether the field is present after defaults were applied.
    fn validate_presence(&self, object: &mut Mapping) -> Result<bool, ValidationError> {
        let present = object
            .get(self.key.as_str())
            .is_some_and(|value| !value.is_null());
        if present {
            return Ok(true);
        }
        match self.presence {
            Presence::UseDefault => {
                let default = self.default.as_ref().and_then(|d| d.resolve(object));
                match default {
                    Some(value) => {
                        object.insert(Value::String(self.key.clone()), value);
                        Ok(true)
                    }
                    None => Err(ValidationError::new(
                        &self.key,
                        "Property must be set, no default found",
                        None,
                        None,
                    )),
                }
            }
            Presence::Optional => Ok(false),
            Presence::Required => Err(ValidationError::new(
                &self.key,
                "Property must be set",
                None,
                None,
            )),
        }
    }

    fn validate_value(&self, object: &Mapping, found: &Value) -> Result<(), ValidationError> {
        if let Some(expected) = self.value.as_ref().and_then(|v| v.resolve(object)) {
            if &expected != found {
                return Err(ValidationError::new(
                    &self.key,
                    "Invalid value",
                    Some(found.clone()),
                    Some(expected),
                ));
            }
        }
        if let Some(allowed) = self.values.as_ref().and_then(|v| v.resolve(object)) {
            let accepted = match &allowed {
                Value::Sequence(items) => items.contains(found),
                single => single == found,
            };
            if !accepted {
                return Err(ValidationError::new(
                    &self.key,
                    "Invalid value",
                    Some(found.clone()),
                    Some(allowed),
                ));
            }
        }
        Ok(())
    }

    fn validate_type(&self, object: &Mapping, found: &Value) -> Result<(), ValidationError> {
        let actual = value_type(found);
        if let Some(expected) = self.value_type.as_ref().and_then(|v| v.resolve(object)) {
            if expected.as_str() != Some(actual.as_str()) {
                return Err(ValidationError::new(
                    &self.key,
                    "Invalid type",
                    Some(found.clone()),
                    Some(expected),
                ));
            }
        }
        if let Some(expected) = self.value_types.as_ref().and_then(|v| v.resolve(object)) {
            let accepted = match &expected {
                Value::Sequence(items) => items.iter().any(|t| t.as_str() == Some(actual.as_str())),
                single => single.as_str() == Some(actual.as_str()),
            };
            if !accepted {
                return Err(ValidationError::new(
                    &self.key,
                    "Invalid type",
                    Some(found.clone()),
                    Some(expected),
                ));
            }
        }
        Ok(())
    }
}

/// An ordered set of field rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldRule>,
}

impl Schema {
    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        Self::from_value(serde_yaml::from_str(source)?)
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let Value::Mapping(map) = value else {
            return Err(SchemaError::NotAMapping);
        };
        let mut fields = Vec::with_capacity(map.len());
        for (key, rule) in map {
            let key = match key {
                Value::String(s) => s,
                other => inline(&other),
            };
            let Value::Mapping(rule) = rule else {
                return Err(SchemaError::InvalidRule(key));
            };
            fields.push(FieldRule::parse(key, &rule)?);
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Validate `object` in declaration order, writing `useDefault` defaults
    /// into it. Stops at the first failing field.
    pub fn validate(&self, object: &mut Mapping) -> Result<(), ValidationError> {
        tracing::trace!(fields = self.fields.len(), "validating config object");
        for field in &self.fields {
            field.validate(object)?;
        }
        Ok(())
    }

    /// Schema default for `key`, resolved against `object`.
    pub fn default_value(&self, object: &Mapping, key: &str) -> Option<Value> {
        self.field(key)?.default.as_ref()?.resolve(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    const TEXTURE_SCHEMA: &str = r#"
type:
  values: [texture, cubemap, hdri]
  valueType: string
  optional: useDefault
  default: texture
sources:
  valueTypes: [array, "object[string]"]
defaultExtension:
  valueType: string
  optional: useDefault
  default:
    target: type
    values:
      hdri: hdr
      default: jpg
root:
  valueType: string
  optional: true
"#;

    #[test]
    fn applies_literal_default_and_value_map_default() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let mut object = mapping("sources: [a.png]");
        schema.validate(&mut object).unwrap();
        assert_eq!(object.get("type").and_then(Value::as_str), Some("texture"));
        assert_eq!(object.get("defaultExtension").and_then(Value::as_str), Some("jpg"));
    }

    #[test]
    fn value_map_reads_target_field() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let mut object = mapping("type: hdri\nsources: [sky]");
        schema.validate(&mut object).unwrap();
        assert_eq!(object.get("defaultExtension").and_then(Value::as_str), Some("hdr"));
    }

    #[test]
    fn missing_required_field_fails_with_key() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let err = schema.validate(&mut mapping("type: texture")).unwrap_err();
        assert_eq!(err.key, "sources");
        assert!(err.found.is_none());
    }

    #[test]
    fn value_outside_allowed_set_reports_found_and_expected() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let err = schema
            .validate(&mut mapping("type: video\nsources: [a]"))
            .unwrap_err();
        assert_eq!(err.key, "type");
        assert_eq!(err.found, Some(Value::String("video".into())));
        assert!(matches!(err.expected, Some(Value::Sequence(_))));
        assert!(err.to_string().contains("given video"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let err = schema
            .validate(&mut mapping("sources: [a]\nroot: 12"))
            .unwrap_err();
        assert_eq!(err.key, "root");
        assert_eq!(err.message, "Invalid type");
    }

    #[test]
    fn absent_optional_field_skips_checks() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let mut object = mapping("sources: {diffuse: d.png}");
        schema.validate(&mut object).unwrap();
        assert!(object.get("root").is_none());
    }

    #[test]
    fn use_default_without_resolvable_default_fails() {
        let schema = Schema::from_yaml_str(
            "ext:\n  optional: useDefault\n  default:\n    target: kind\n    values:\n      a: x\n",
        )
        .unwrap();
        let err = schema.validate(&mut mapping("kind: b")).unwrap_err();
        assert_eq!(err.key, "ext");
        let mut ok = mapping("kind: a");
        schema.validate(&mut ok).unwrap();
        assert_eq!(ok.get("ext").and_then(Value::as_str), Some("x"));
    }

    #[test]
    fn value_type_names() {
        assert_eq!(value_type(&Value::Sequence(vec![])), "array");
        assert_eq!(value_type(&Value::Mapping(Mapping::new())), "object");
        assert_eq!(value_type(&serde_yaml::from_str("{a: [1]}").unwrap()), "object[array]");
        assert_eq!(value_type(&serde_yaml::from_str("{a: 1, b: x}").unwrap()), "object[number]");
        assert_eq!(value_type(&Value::Bool(true)), "boolean");
    }

    #[test]
    fn default_value_resolves_against_object() {
        let schema = Schema::from_yaml_str(TEXTURE_SCHEMA).unwrap();
        let object = mapping("type: hdri");
        assert_eq!(
            schema.default_value(&object, "defaultExtension"),
            Some(Value::String("hdr".into()))
        );
        assert_eq!(schema.default_value(&object, "root"), None);
    }

    #[test]
    fn rejects_malformed_optional_flag() {
        let err = Schema::from_yaml_str("a:\n  optional: sometimes\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidOptional { .. }));
    }
}
