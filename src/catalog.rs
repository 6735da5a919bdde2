use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{io, path::PathBuf};

/// One download entry from `download.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "de_text")]
    pub title: String,
    #[serde(default, deserialize_with = "de_optional_text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de_optional_text")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "de_truthy")]
    pub visible: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("expected an object with an \"items\" list or a bare list, found {0}")]
    Shape(&'static str),
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Strings as-is, numbers in their JSON form; anything else is absent.
fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(text(Value::deserialize(d)?).unwrap_or_default())
}

/// Empty strings count as absent.
fn de_optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text(Value::deserialize(d)?).filter(|s| !s.trim().is_empty()))
}

/// Hand-edited catalogs use `true`, `1` and `"yes"` interchangeably.
fn de_truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    })
}

/// Parse `{ "items": [...] }` or a bare list.
///
/// Entries are converted one at a time; an entry that is not an object is
/// logged and skipped so it cannot hide the rest of the list.
pub fn parse(raw: &str) -> Result<Vec<Item>, CatalogError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let entries = match serde_json::from_str(text)? {
        Value::Array(entries) => entries,
        Value::Object(mut root) => match root.remove("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(other) => return Err(CatalogError::Shape(kind(&other))),
        },
        other => return Err(CatalogError::Shape(kind(&other))),
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Item>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping catalog entry {}: {}", index, e);
                None
            }
        })
        .collect())
}

/// Items eligible for display, in catalog order.
pub fn visible_items(items: Vec<Item>) -> Vec<Item> {
    items.into_iter().filter(|item| item.visible).collect()
}

/// Read-only access to `download.json`.
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every item. A missing or unreadable catalog is logged and shows
    /// up as an empty list rather than an error page.
    pub async fn load(&self) -> Vec<Item> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    tracing::warn!("Catalog {} does not exist", self.path.display());
                } else {
                    tracing::warn!("Cannot read catalog {}: {}", self.path.display(), e);
                }
                return Vec::new();
            }
        };

        parse(&raw).unwrap_or_else(|e| {
            tracing::warn!("Catalog {} is malformed: {}", self.path.display(), e);
            Vec::new()
        })
    }
}
