//! JSON documents stored in collections
//!
//! A [`Document`] is always a JSON object. Documents carry their identifier in
//! the `_id` member; [`Document::ensure_id`] assigns a generated one when it is
//! missing.
//!
//! [`DocPath`] addresses a member inside a document:
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `$` / (empty) | whole document | `$` |
//! | `key` / `$.key` | object member | `$.name` |
//! | `[n]` | array element | `tags[0]` |
//! | `a.b[n].c` | nested | `$.items[1].qty` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Name of the identifier member.
pub const ID_FIELD: &str = "_id";

/// Generate a document identifier: 32 upper-case hex digits.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

/// A segment of a [`DocPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

/// A path into a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DocPath {
    segments: Vec<PathSegment>,
}

impl DocPath {
    /// Path segments in order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True for the whole-document path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for DocPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix('$').unwrap_or(s);
        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    if i >= chars.len() || chars[i] == '.' {
                        return Err(Error::InvalidPath(format!("empty member name in '{}'", s)));
                    }
                }
                '[' => {
                    let start = i + 1;
                    let end = chars[start..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| start + p)
                        .ok_or_else(|| Error::InvalidPath(format!("unclosed bracket in '{}'", s)))?;
                    let idx: String = chars[start..end].iter().collect();
                    let idx = idx
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| Error::InvalidPath(format!("bad array index '{}'", idx)))?;
                    segments.push(PathSegment::Index(idx));
                    i = end + 1;
                }
                c if c.is_alphanumeric() || c == '_' || c == '-' => {
                    let start = i;
                    while i < chars.len()
                        && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                    {
                        i += 1;
                    }
                    segments.push(PathSegment::Key(chars[start..i].iter().collect()));
                }
                c => {
                    return Err(Error::InvalidPath(format!(
                        "unexpected '{}' at position {}",
                        c, i
                    )))
                }
            }
        }

        Ok(DocPath { segments })
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

/// A JSON object document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct Document(JsonValue);

impl Default for Document {
    fn default() -> Self {
        Document(JsonValue::Object(Map::new()))
    }
}

impl TryFrom<JsonValue> for Document {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        Self::from_json(value)
    }
}

impl From<Document> for JsonValue {
    fn from(doc: Document) -> Self {
        doc.0
    }
}

impl Document {
    /// Parse JSON text; anything other than an object is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let value: JsonValue =
            serde_json::from_str(text).map_err(|e| Error::InvalidDocument(e.to_string()))?;
        Self::from_json(value)
    }

    /// Wrap a JSON value; anything other than an object is rejected.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(_) => Ok(Document(value)),
            other => Err(Error::InvalidDocument(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Identifier of the document, if it has one.
    pub fn id(&self) -> Option<String> {
        match self.0.get(ID_FIELD)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Return the identifier, generating and storing one when missing.
    pub fn ensure_id(&mut self) -> String {
        if let Some(id) = self.id() {
            return id;
        }
        let id = generate_id();
        if let JsonValue::Object(map) = &mut self.0 {
            map.insert(ID_FIELD.to_string(), JsonValue::String(id.clone()));
        }
        id
    }

    /// Borrow as a JSON value (always an object).
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    /// Serialize to compact JSON text.
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// Unwrap into a JSON value.
    pub fn into_json(self) -> JsonValue {
        self.0
    }

    /// Value at `path`, if present. The root path yields the whole document.
    pub fn get(&self, path: &DocPath) -> Option<&JsonValue> {
        let mut current = &self.0;
        for seg in path.segments() {
            current = match (seg, current) {
                (PathSegment::Key(k), JsonValue::Object(obj)) => obj.get(k)?,
                (PathSegment::Index(i), JsonValue::Array(arr)) => arr.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set the value at `path`, creating intermediate objects.
    pub fn set(&mut self, path: &DocPath, value: JsonValue) -> Result<()> {
        let (parent, last) = self.parent_mut(path, true)?;
        match (last, parent) {
            (PathSegment::Key(k), JsonValue::Object(obj)) => {
                obj.insert(k.clone(), value);
                Ok(())
            }
            (PathSegment::Index(i), JsonValue::Array(arr)) if *i < arr.len() => {
                arr[*i] = value;
                Ok(())
            }
            (PathSegment::Index(i), JsonValue::Array(arr)) if *i == arr.len() => {
                arr.push(value);
                Ok(())
            }
            _ => Err(Error::InvalidPath(format!("cannot set {}", path))),
        }
    }

    /// Remove the member or array element at `path`. Returns whether
    /// something was removed.
    pub fn remove(&mut self, path: &DocPath) -> bool {
        let Ok((parent, last)) = self.parent_mut(path, false) else {
            return false;
        };
        match (last, parent) {
            (PathSegment::Key(k), JsonValue::Object(obj)) => obj.remove(k).is_some(),
            (PathSegment::Index(i), JsonValue::Array(arr)) if *i < arr.len() => {
                arr.remove(*i);
                true
            }
            _ => false,
        }
    }

    /// Insert `value` before the array element addressed by `path`.
    pub fn array_insert(&mut self, path: &DocPath, value: JsonValue) -> Result<()> {
        let (parent, last) = self.parent_mut(path, false)?;
        match (last, parent) {
            (PathSegment::Index(i), JsonValue::Array(arr)) => {
                let at = (*i).min(arr.len());
                arr.insert(at, value);
                Ok(())
            }
            _ => Err(Error::InvalidPath(format!("{} is not an array element", path))),
        }
    }

    /// Append `value` to the array at `path`. A scalar found at `path` is
    /// turned into a two element array first.
    pub fn array_append(&mut self, path: &DocPath, value: JsonValue) -> Result<()> {
        let (parent, last) = self.parent_mut(path, false)?;
        let slot = match (last, parent) {
            (PathSegment::Key(k), JsonValue::Object(obj)) => obj.get_mut(k),
            (PathSegment::Index(i), JsonValue::Array(arr)) => arr.get_mut(*i),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidPath(format!("{} does not exist", path)))?;

        match slot {
            JsonValue::Array(arr) => arr.push(value),
            scalar => {
                let old = std::mem::take(scalar);
                *scalar = JsonValue::Array(vec![old, value]);
            }
        }
        Ok(())
    }

    /// Delete the array element addressed by `path`.
    pub fn array_delete(&mut self, path: &DocPath) -> Result<()> {
        match path.segments().last() {
            Some(PathSegment::Index(_)) if self.remove(path) => Ok(()),
            _ => Err(Error::InvalidPath(format!("{} is not an array element", path))),
        }
    }

    fn parent_mut<'a>(
        &mut self,
        path: &'a DocPath,
        create: bool,
    ) -> Result<(&mut JsonValue, &'a PathSegment)> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| Error::InvalidPath("the document root cannot be replaced".into()))?;
        let mut current = &mut self.0;
        for seg in parents {
            current = match (seg, current) {
                (PathSegment::Key(k), JsonValue::Object(obj)) => {
                    if create && !obj.contains_key(k) {
                        obj.insert(k.clone(), JsonValue::Object(Map::new()));
                    }
                    obj.get_mut(k)
                }
                (PathSegment::Index(i), JsonValue::Array(arr)) => arr.get_mut(*i),
                _ => None,
            }
            .ok_or_else(|| Error::InvalidPath(format!("{} does not exist", path)))?;
        }
        Ok((current, last))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
