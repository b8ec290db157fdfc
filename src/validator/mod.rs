//! Structural validation of imported rule and title entries

mod types;

pub use types::*;

use crate::pathgen::has_path_traversal;
use serde_json::Value;
use tracing::debug;

#[derive(Clone, Copy)]
enum FieldType {
    Str,
    Bool,
    Int,
    StrList,
    Object,
    NullableBool,
    NullableStr,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::Str => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Int => value.is_i64(),
            FieldType::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldType::Object => value.is_object(),
            FieldType::NullableBool => value.is_null() || value.is_boolean(),
            FieldType::NullableStr => value.is_null() || value.is_string(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldType::Str => "a string",
            FieldType::Bool => "a boolean",
            FieldType::Int => "an integer",
            FieldType::StrList => "an array of strings",
            FieldType::Object => "an object",
            FieldType::NullableBool => "a boolean or null",
            FieldType::NullableStr => "a string or null",
        }
    }
}

/// Server-recognised rule fields and their JSON types
const RULE_FIELDS: &[(&str, FieldType)] = &[
    ("enabled", FieldType::Bool),
    ("mustContain", FieldType::Str),
    ("mustNotContain", FieldType::Str),
    ("useRegex", FieldType::Bool),
    ("episodeFilter", FieldType::Str),
    ("smartFilter", FieldType::Bool),
    ("previouslyMatchedEpisodes", FieldType::StrList),
    ("affectedFeeds", FieldType::StrList),
    ("ignoreDays", FieldType::Int),
    ("lastMatch", FieldType::Str),
    ("addPaused", FieldType::NullableBool),
    ("assignedCategory", FieldType::Str),
    ("savePath", FieldType::Str),
    ("priority", FieldType::Int),
    ("torrentContentLayout", FieldType::NullableStr),
    ("torrentParams", FieldType::Object),
];

/// Check one rule definition before it is deserialized.
///
/// `mustContain` is required; every known field must carry its wire type and
/// neither `savePath` nor `torrentParams.save_path` may climb out with `..`.
pub fn validate_rule_entry(value: &Value) -> Result<(), EntryError> {
    let obj = value.as_object().ok_or(EntryError::NotAnObject)?;

    if !obj.contains_key("mustContain") {
        return Err(EntryError::MissingField("mustContain"));
    }

    for (field, ty) in RULE_FIELDS {
        if let Some(v) = obj.get(*field) {
            if !ty.accepts(v) {
                return Err(EntryError::WrongType {
                    field: field.to_string(),
                    expected: ty.describe(),
                });
            }
        }
    }

    let nested_save_path = obj
        .get("torrentParams")
        .and_then(|tp| tp.get("save_path"))
        .and_then(Value::as_str);
    for path in [obj.get("savePath").and_then(Value::as_str), nested_save_path]
        .into_iter()
        .flatten()
    {
        if has_path_traversal(path) {
            return Err(EntryError::PathTraversal(path.to_string()));
        }
    }

    Ok(())
}

/// A title pulled from one entry of a title source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleFields {
    pub title: String,
    pub source_id: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts a bare string, `{title, url, malId, image}` or `{node: {title, ...}}`
pub fn validate_title_entry(value: &Value) -> Result<TitleFields, EntryError> {
    if let Value::String(s) = value {
        let title = s.trim();
        if title.is_empty() {
            return Err(EntryError::MissingTitle);
        }
        return Ok(TitleFields {
            title: title.to_string(),
            ..Default::default()
        });
    }

    let obj = value.as_object().ok_or(EntryError::NotAnObject)?;
    let obj = match obj.get("node").and_then(Value::as_object) {
        Some(node) => {
            debug!("Unwrapping node-style title entry");
            node
        }
        None => obj,
    };

    let title = non_empty_str(obj.get("title")).ok_or(EntryError::MissingTitle)?;

    Ok(TitleFields {
        title,
        source_id: id_string(obj.get("malId").or_else(|| obj.get("id"))),
        url: non_empty_str(obj.get("url")),
        image: non_empty_str(obj.get("image")).or_else(|| {
            obj.get("main_picture")
                .and_then(|p| non_empty_str(p.get("medium")))
        }),
    })
}
