//! Build properties and the property store seam used for template rendering.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::template::Template;

/// Property carrying the revision(s) checked out by the build.
pub const GOT_REVISION: &str = "got_revision";
/// Property naming the builder that ran the build.
pub const BUILDER_NAME: &str = "buildername";
/// Property set by pull request change sources.
pub const PULL_REQUEST_URL: &str = "pullrequesturl";

/// A single property value. Scalars, lists and per-codebase mappings are all
/// valid property values.
pub type PropertyValue = Value;

/// Read-only view of a build's properties.
///
/// Template rendering is a suspending operation so that stores backed by a
/// remote property service can implement it.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Look up a property by name.
    fn get(&self, name: &str) -> Option<&PropertyValue>;

    /// Whether the property is set at all (a JSON `null` still counts).
    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolve every interpolation in `template` against this store.
    async fn render(&self, template: &Template) -> String {
        template.render_with(|name| self.get(name))
    }
}

/// In-memory property map of one build.
///
/// Deserializes from either the plain `{"name": value}` form or the build
/// engine's `{"name": [value, "source"]}` form; the source is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, returning `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up `name`, falling back to `default` when unset.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a PropertyValue) -> &'a PropertyValue {
        self.values.get(name).unwrap_or(default)
    }

    /// Property value rendered the way templates render it.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.values.get(name).map(value_to_string)
    }

    /// The revision(s) the build checked out, if any.
    pub fn got_revision(&self) -> Option<GotRevision> {
        self.values.get(GOT_REVISION).and_then(GotRevision::from_value)
    }

    pub fn builder_name(&self) -> Option<String> {
        self.get_string(BUILDER_NAME)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl PropertyStore for Properties {
    fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let values = raw
            .into_iter()
            .map(|(name, value)| (name, strip_source(value)))
            .collect();
        Ok(Properties { values })
    }
}

/// Unwrap `[value, "source"]` pairs into `value`.
fn strip_source(value: Value) -> Value {
    match value {
        Value::Array(mut pair) if pair.len() == 2 && pair[1].is_string() => pair.swap_remove(0),
        other => other,
    }
}

/// Render a property value as text: strings verbatim, `null` as empty,
/// everything else as compact JSON.
pub fn value_to_string(value: &PropertyValue) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `got_revision` property, which is either a single revision or one
/// revision per codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GotRevision {
    Scalar(String),
    PerCodebase(BTreeMap<String, String>),
}

impl GotRevision {
    /// Interpret a raw property value. `null` means the property is unset.
    pub fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(GotRevision::Scalar(s.clone())),
            Value::Object(map) => Some(GotRevision::PerCodebase(
                map.iter()
                    .filter_map(|(codebase, rev)| {
                        rev.as_str().map(|rev| (codebase.clone(), rev.to_string()))
                    })
                    .collect(),
            )),
            other => Some(GotRevision::Scalar(other.to_string())),
        }
    }

    /// The revision for `codebase`. A scalar applies to every codebase.
    pub fn for_codebase(&self, codebase: &str) -> Option<&str> {
        match self {
            GotRevision::Scalar(sha) => Some(sha.as_str()),
            GotRevision::PerCodebase(map) => map.get(codebase).map(String::as_str),
        }
    }
}
