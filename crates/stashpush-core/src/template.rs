//! Deferred property templates.
//!
//! A [`Template`] is parsed once when the notifier is configured and rendered
//! later, per build, against a [`crate::PropertyStore`]. Rendering never
//! fails: unset properties render as empty strings unless a modifier says
//! otherwise.
//!
//! Supported syntax:
//!
//! | Form | Renders |
//! |---|---|
//! | `%(prop:name)s` | the property, or empty when unset |
//! | `%(prop:name:-text)s` | the property, or `text` when unset |
//! | `%(prop:name:~text)s` | the property, or `text` when unset or falsy |
//! | `%(prop:name:+text)s` | `text` when set, otherwise empty |
//! | `%(prop:name:?\|yes\|no)s` | `yes` when set, otherwise `no` |
//! | `%%` | a literal `%` |

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::properties::value_to_string;
use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modifier {
    Default(String),
    DefaultIfFalsy(String),
    Replace(String),
    IfSet { set: String, unset: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Property {
        name: String,
        modifier: Option<Modifier>,
    },
}

/// An unresolved string with embedded property references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn property_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("static regex"))
}

impl Template {
    /// Parse an interpolation template.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("%%") {
                literal.push('%');
                rest = &tail[2..];
                offset += pos + 2;
                continue;
            }

            if !tail.starts_with("%(") {
                literal.push('%');
                rest = &tail[1..];
                offset += pos + 1;
                continue;
            }

            let end = tail.find(")s").ok_or_else(|| TemplateError::Unterminated {
                template: source.to_string(),
                offset: offset + pos,
            })?;
            let expr = &tail[2..end];
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(parse_expr(source, expr)?);

            rest = &tail[end + 2..];
            offset += pos + end + 2;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// A template that renders `text` verbatim, `%` included.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.clone())]
        };
        Template {
            source: text.replace('%', "%%"),
            segments,
        }
    }

    /// Shorthand for `%(prop:name)s`.
    pub fn property(name: &str) -> Self {
        Template {
            source: format!("%(prop:{name})s"),
            segments: vec![Segment::Property {
                name: name.to_string(),
                modifier: None,
            }],
        }
    }

    /// The template text this value was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the template contains no property references.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Render using an arbitrary property lookup.
    pub fn render_with<'v, F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'v Value>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Property { name, modifier } => {
                    let value = lookup(name);
                    out.push_str(&render_property(value, modifier.as_ref()));
                }
            }
        }
        out
    }
}

fn parse_expr(template: &str, expr: &str) -> Result<Segment, TemplateError> {
    let malformed = || TemplateError::Malformed {
        expr: format!("%({expr})s"),
    };

    let (source_kind, body) = expr.split_once(':').ok_or_else(malformed)?;
    if source_kind != "prop" {
        return Err(TemplateError::UnsupportedSource {
            template: template.to_string(),
            source_kind: source_kind.to_string(),
        });
    }

    let (name, modifier) = match body.split_once(':') {
        None => (body, None),
        Some((name, spec)) => (name, Some(parse_modifier(spec).ok_or_else(malformed)?)),
    };
    if !property_name_re().is_match(name) {
        return Err(malformed());
    }

    Ok(Segment::Property {
        name: name.to_string(),
        modifier,
    })
}

fn parse_modifier(spec: &str) -> Option<Modifier> {
    let mut chars = spec.chars();
    let kind = chars.next()?;
    let arg = chars.as_str().to_string();
    match kind {
        '-' => Some(Modifier::Default(arg)),
        '~' => Some(Modifier::DefaultIfFalsy(arg)),
        '+' => Some(Modifier::Replace(arg)),
        '?' => {
            // ?|set|unset, any delimiter character is allowed
            let mut delim = arg.chars();
            let sep = delim.next()?;
            let parts: Vec<&str> = delim.as_str().split(sep).collect();
            match parts.as_slice() {
                [set, unset] => Some(Modifier::IfSet {
                    set: set.to_string(),
                    unset: unset.to_string(),
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render_property(value: Option<&Value>, modifier: Option<&Modifier>) -> String {
    match (modifier, value) {
        (None, Some(v)) => value_to_string(v),
        (None, None) => String::new(),
        (Some(Modifier::Default(_)), Some(v)) => value_to_string(v),
        (Some(Modifier::Default(d)), None) => d.clone(),
        (Some(Modifier::DefaultIfFalsy(d)), v) => match v {
            Some(v) if is_truthy(v) => value_to_string(v),
            _ => d.clone(),
        },
        (Some(Modifier::Replace(r)), Some(_)) => r.clone(),
        (Some(Modifier::Replace(_)), None) => String::new(),
        (Some(Modifier::IfSet { set, .. }), Some(_)) => set.clone(),
        (Some(Modifier::IfSet { unset, .. }), None) => unset.clone(),
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Template::parse(&source)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> String {
        template.source
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn render(template: &str, props: &HashMap<&str, Value>) -> String {
        Template::parse(template)
            .unwrap()
            .render_with(|name| props.get(name))
    }

    #[test]
    fn test_plain_text_is_static() {
        let t = Template::parse("Build started.").unwrap();
        assert!(t.is_static());
        assert_eq!(t.render_with(|_| None), "Build started.");
    }

    #[test]
    fn test_property_interpolation() {
        let props = HashMap::from([("buildername", json!("linux")), ("buildnumber", json!(7))]);
        assert_eq!(
            render("%(prop:buildername)s #%(prop:buildnumber)s", &props),
            "linux #7"
        );
    }

    #[test]
    fn test_missing_property_renders_empty() {
        let props = HashMap::new();
        assert_eq!(render("[%(prop:buildername)s]", &props), "[]");
    }

    #[test]
    fn test_default_modifiers() {
        let props = HashMap::from([("empty", json!("")), ("set", json!("v"))]);
        assert_eq!(render("%(prop:missing:-dflt)s", &props), "dflt");
        assert_eq!(render("%(prop:empty:-dflt)s", &props), "");
        assert_eq!(render("%(prop:empty:~dflt)s", &props), "dflt");
        assert_eq!(render("%(prop:set:~dflt)s", &props), "v");
    }

    #[test]
    fn test_replace_and_conditional_modifiers() {
        let props = HashMap::from([("pr", json!("https://host/prs/1"))]);
        assert_eq!(render("%(prop:pr:+PR)s", &props), "PR");
        assert_eq!(render("%(prop:nope:+PR)s", &props), "");
        assert_eq!(render("%(prop:pr:?|yes|no)s", &props), "yes");
        assert_eq!(render("%(prop:nope:?|yes|no)s", &props), "no");
    }

    #[test]
    fn test_percent_escape() {
        let props = HashMap::from([("pct", json!(50))]);
        assert_eq!(render("%(prop:pct)s%% done, 5% left", &props), "50% done, 5% left");
    }

    #[test]
    fn test_unterminated_interpolation_is_rejected() {
        let err = Template::parse("key-%(prop:buildername").unwrap_err();
        assert!(matches!(err, TemplateError::Unterminated { offset: 4, .. }));
    }

    #[test]
    fn test_unsupported_source_is_rejected() {
        let err = Template::parse("%(kw:foo)s").unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedSource { .. }));
    }

    #[test]
    fn test_malformed_expression_is_rejected() {
        assert!(Template::parse("%(prop:)s").is_err());
        assert!(Template::parse("%(prop:a b)s").is_err());
        assert!(Template::parse("%(prop:a:!x)s").is_err());
        assert!(Template::parse("%(prop:a:?|only)s").is_err());
    }

    #[test]
    fn test_literal_keeps_percent_signs() {
        let t = Template::literal("100%(prop:x)s");
        assert_eq!(t.render_with(|_| None), "100%(prop:x)s");
        assert_eq!(Template::parse(t.source()).unwrap().render_with(|_| None), "100%(prop:x)s");
    }

    #[test]
    fn test_serde_uses_source_text() {
        let t: Template = serde_json::from_value(json!("%(prop:buildername)s")).unwrap();
        assert_eq!(t, Template::property("buildername"));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!("%(prop:buildername)s"));
    }
}
