//! Content formats and info-file rewriting.
//!
//! New content is checked for well-formedness before any write. Info files
//! (`info*.json`) carry the identifiers that rename and copy keep consistent.

use crate::error::{EditError, Result};
use serde_json::Value;
use uuid::Uuid;

/// Prefix of info file names, e.g. `infoAssessment.json`.
pub const INFO_FILE_PREFIX: &str = "info";

/// Field holding an entity's name relative to its scope root.
pub const ID_FIELD: &str = "id";

/// Field holding an entity's globally unique identifier.
pub const UUID_FIELD: &str = "uuid";

/// Field holding an entity's display title.
pub const TITLE_FIELD: &str = "title";

/// Declared format of a file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Text,
    Binary,
}

impl ContentFormat {
    pub fn from_path(path: &str) -> Self {
        let ext = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("json") => Self::Json,
            Some(
                "md" | "txt" | "html" | "py" | "js" | "ts" | "css" | "csv" | "toml" | "yaml"
                | "yml",
            ) => Self::Text,
            _ => Self::Binary,
        }
    }

    /// Checks that `content` is well-formed for this format.
    pub fn validate(self, path: &str, content: &[u8]) -> Result<()> {
        match self {
            Self::Json => serde_json::from_slice::<Value>(content)
                .map(|_| ())
                .map_err(|e| EditError::MalformedContent {
                    path: path.to_string(),
                    reason: e.to_string(),
                }),
            Self::Text => std::str::from_utf8(content)
                .map(|_| ())
                .map_err(|e| EditError::MalformedContent {
                    path: path.to_string(),
                    reason: e.to_string(),
                }),
            Self::Binary => Ok(()),
        }
    }
}

/// Returns true if the file at `path` is an info file.
pub fn is_info_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.starts_with(INFO_FILE_PREFIX) && ContentFormat::from_path(name) == ContentFormat::Json
}

/// Decides whether a settings property should be written.
///
/// When the property was absent and the new value equals its default, the
/// property stays absent (`None`). Otherwise the new value is written.
///
/// ```
/// use ced_core::property_value_with_default;
/// use serde_json::json;
///
/// assert_eq!(property_value_with_default(None, json!(true), json!(true)), None);
/// assert_eq!(
///     property_value_with_default(Some(&json!(false)), json!(true), json!(true)),
///     Some(json!(true))
/// );
/// ```
pub fn property_value_with_default(
    existing: Option<&Value>,
    new: Value,
    default: Value,
) -> Option<Value> {
    match existing {
        None if new == default => None,
        _ => Some(new),
    }
}

/// Parsed info file.
#[derive(Debug, Clone)]
pub struct InfoFile {
    value: Value,
}

impl InfoFile {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(bytes).map_err(|e| EditError::MalformedContent {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { value })
    }

    fn get_str(&self, field: &str) -> Option<&str> {
        self.value.get(field).and_then(Value::as_str)
    }

    fn set_str(&mut self, field: &str, value: String) -> bool {
        match self.value.as_object_mut() {
            Some(map) => {
                map.insert(field.to_string(), Value::String(value));
                true
            }
            None => false,
        }
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.get_str(UUID_FIELD).and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Rewrites the `id` field when it names `old` (or something below it).
    ///
    /// Returns true if the field changed.
    pub fn rename_id(&mut self, old: &str, new: &str) -> bool {
        let Some(current) = self.get_str(ID_FIELD) else {
            return false;
        };
        let renamed = if current == old {
            new.to_string()
        } else if let Some(rest) = current
            .strip_prefix(old)
            .filter(|rest| rest.starts_with('/'))
        {
            format!("{}{}", new, rest)
        } else {
            return false;
        };
        self.set_str(ID_FIELD, renamed)
    }

    /// Replaces the `uuid` field with a fresh v4 uuid, if the file has one.
    pub fn regenerate_uuid(&mut self) -> Option<Uuid> {
        self.value.get(UUID_FIELD)?;
        let fresh = Uuid::new_v4();
        self.set_str(UUID_FIELD, fresh.to_string()).then_some(fresh)
    }

    /// Appends a suffix to the `title` field, if the file has one.
    pub fn suffix_title(&mut self, suffix: &str) -> bool {
        let Some(title) = self.get_str(TITLE_FIELD).map(str::to_string) else {
            return false;
        };
        self.set_str(TITLE_FIELD, format!("{}{}", title, suffix))
    }

    /// Sets an arbitrary top-level property.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match self.value.as_object_mut() {
            Some(map) => {
                map.insert(field.to_string(), value);
                Ok(())
            }
            None => Err(EditError::Validation(
                "info file is not a JSON object".to_string(),
            )),
        }
    }

    /// Removes a top-level property.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.value.as_object_mut().and_then(|map| map.remove(field))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    /// Serializes as pretty JSON with a trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(&self.value)
            .map_err(|e| EditError::Serialization(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}
