use std::{borrow::Cow, collections::BTreeMap, fmt};

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a map of attribute names to attribute values.
///
/// # Examples
/// ```
/// # use questline::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("username".to_owned(), "john_doe".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Semi-structured, read-only attribute tree: user properties captured at session start or the
/// properties of a single tracked event.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, `bool`, vectors of
/// values, [`Attributes`] and [`serde_json::Value`].
///
/// ```
/// # use questline::AttributeValue;
/// let user: AttributeValue = serde_json::json!({
///     "country": "DE",
///     "devices": [{"os": "android", "version": "13.1.0"}],
/// }).into();
///
/// assert_eq!(user.lookup("devices.0.os"), Some(&AttributeValue::from("android")));
/// assert_eq!(user.lookup("devices[0].version"), Some(&AttributeValue::from("13.1.0")));
/// assert_eq!(user.lookup("devices.1.os"), None);
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A null value.
    #[default]
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A numerical value.
    Number(f64),
    /// A string value.
    String(String),
    /// An ordered sequence of values.
    Array(Vec<AttributeValue>),
    /// A map of unique keys to values.
    Object(Attributes),
}

impl AttributeValue {
    /// Resolve a dot/bracket path (`a.b.c`, `a.0.b`, `a[0].b`, `a['b']`).
    ///
    /// Returns `None` as soon as any segment is missing. A present `null` resolves to
    /// `Some(&AttributeValue::Null)`. The empty path resolves to `self`.
    pub fn lookup(&self, path: &str) -> Option<&AttributeValue> {
        if path.is_empty() {
            return Some(self);
        }
        path_segments(path)?
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    fn child(&self, segment: &str) -> Option<&AttributeValue> {
        match self {
            Self::Object(map) => map.get(segment),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Self::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<&[AttributeValue]> {
        if let Self::Array(items) = self {
            Some(items)
        } else {
            None
        }
    }

    pub fn as_object(&self) -> Option<&Attributes> {
        if let Self::Object(map) = self {
            Some(map)
        } else {
            None
        }
    }

    /// Canonical type tag used by the `$type` operator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Plain string form used for regex, containment and version comparisons.
    ///
    /// Strings are returned as-is (unquoted), null is empty, and everything else uses the compact
    /// JSON rendering from [`Display`](fmt::Display).
    pub fn to_string_form(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::String(s) => Cow::Borrowed(s),
            Self::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            _ => Cow::Owned(self.to_string()),
        }
    }

    /// Return a copy of this tree with top-level keys replaced by `overrides`.
    ///
    /// Non-object trees are replaced by `overrides` entirely unless `overrides` is empty.
    pub fn with_overrides(&self, overrides: &Attributes) -> AttributeValue {
        match self {
            Self::Object(base) => {
                let mut merged = base.clone();
                merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
                Self::Object(merged)
            }
            _ if overrides.is_empty() => self.clone(),
            _ => Self::Object(overrides.clone()),
        }
    }
}

/// Split a path into lookup segments. Returns `None` for unbalanced brackets.
fn path_segments(path: &str) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = part.split_at(part.find('[').unwrap_or(part.len()));
        if !name.is_empty() || rest.is_empty() {
            segments.push(name);
        }
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let end = inner.find(']')?;
            segments.push(inner[..end].trim_matches(|c| c == '\'' || c == '"'));
            rest = &inner[end + 1..];
        }
    }
    Some(segments)
}

/// Compact JSON rendering. Numbers use their shortest form (`5`, not `5.0`).
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write_json_string(f, s),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_json_string(f, key)?;
                    write!(f, ":{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl AttributeValue {
    /// JSON rendering indented by two spaces per level, with `": "` after object keys. Numbers use
    /// their shortest form and empty containers stay on one line (`[]`, `{}`).
    pub fn to_indented_string(&self) -> String {
        let mut out = String::new();
        write_indented(&mut out, self, 0);
        out
    }
}

fn write_indented(out: &mut String, value: &AttributeValue, depth: usize) {
    let (open, close, entries): (char, char, Vec<(Option<&String>, &AttributeValue)>) = match value {
        AttributeValue::Array(items) if !items.is_empty() => {
            ('[', ']', items.iter().map(|item| (None, item)).collect())
        }
        AttributeValue::Object(map) if !map.is_empty() => {
            ('{', '}', map.iter().map(|(key, value)| (Some(key), value)).collect())
        }
        _ => {
            out.push_str(&value.to_string());
            return;
        }
    };

    out.push(open);
    for (i, (key, item)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('\n');
        out.push_str(&"  ".repeat(depth + 1));
        if let Some(key) = key {
            out.push_str(&AttributeValue::String(key.clone()).to_string());
            out.push_str(": ");
        }
        write_indented(out, item, depth + 1);
    }
    out.push('\n');
    out.push_str(&"  ".repeat(depth));
    out.push(close);
}

fn write_json_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    f.write_str(&quoted)
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}
