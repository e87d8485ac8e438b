//! Dataset records and the metadata stored alongside each indexed title.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A metadata value as the collection stores it. Only these three types are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Str(String),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    /// Coerces an arbitrary JSON value. Anything that is not a string or number is
    /// stored as its JSON text; `null` becomes an empty string.
    pub fn coerce(value: Value) -> Self {
        match value {
            Value::String(s) => MetadataValue::Str(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::Null => MetadataValue::Str(String::new()),
            other => MetadataValue::Str(other.to_string()),
        }
    }

    /// Empty strings and zeroes count as absent when printing optional fields.
    pub fn is_truthy(&self) -> bool {
        match self {
            MetadataValue::Str(s) => !s.is_empty(),
            MetadataValue::Int(i) => *i != 0,
            MetadataValue::Float(f) => *f != 0.0,
        }
    }
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Int(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:?}"),
            MetadataValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A dataset line ready for embedding: id, document text and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

fn record_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Splits a question record into document and metadata.
///
/// Returns `None` when the record has no usable `id` or `title`; such records are
/// never indexed.
pub fn prepare_record(record: Value) -> Option<PreparedRecord> {
    let Value::Object(mut fields) = record else {
        return None;
    };

    let id = fields.get("id").and_then(record_id)?;
    let document = match fields.get("title") {
        Some(Value::String(title)) if !title.is_empty() => title.clone(),
        _ => return None,
    };

    fields.remove("id");
    fields.remove("title");

    let metadata = fields
        .into_iter()
        .map(|(key, value)| (key, MetadataValue::coerce(value)))
        .collect();

    Some(PreparedRecord {
        id,
        document,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_strips_id_and_title() {
        let record = json!({
            "id": 4,
            "title": "How to convert a Decimal to a Double in C#?",
            "tags": "c#|floating-point|type-conversion",
            "score": 797,
            "view_count": 70633,
        });

        let prepared = prepare_record(record).unwrap();
        assert_eq!(prepared.id, "4");
        assert_eq!(prepared.document, "How to convert a Decimal to a Double in C#?");
        assert!(!prepared.metadata.contains_key("id"));
        assert!(!prepared.metadata.contains_key("title"));
        assert_eq!(prepared.metadata["score"], MetadataValue::Int(797));
        assert_eq!(
            prepared.metadata["tags"],
            MetadataValue::Str("c#|floating-point|type-conversion".to_string())
        );
    }

    #[test]
    fn test_missing_id_or_title_is_skipped() {
        assert!(prepare_record(json!({"title": "no id"})).is_none());
        assert!(prepare_record(json!({"id": 1})).is_none());
        assert!(prepare_record(json!({"id": "", "title": "empty id"})).is_none());
        assert!(prepare_record(json!({"id": 1, "title": ""})).is_none());
        assert!(prepare_record(json!({"id": null, "title": "null id"})).is_none());
        assert!(prepare_record(json!(["not", "an", "object"])).is_none());
    }

    #[test]
    fn test_string_id_kept_verbatim() {
        let prepared = prepare_record(json!({"id": "q-17", "title": "t"})).unwrap();
        assert_eq!(prepared.id, "q-17");
    }

    #[test]
    fn test_non_scalar_values_are_coerced_to_strings() {
        let record = json!({
            "id": 9,
            "title": "t",
            "is_answered": true,
            "tags": ["c", "pointers"],
            "owner": {"user_id": 3},
            "last_edit_date": null,
            "ratio": 0.5,
        });

        let prepared = prepare_record(record).unwrap();
        let meta = &prepared.metadata;
        assert_eq!(meta["is_answered"], MetadataValue::Str("true".to_string()));
        assert_eq!(meta["tags"], MetadataValue::Str(r#"["c","pointers"]"#.to_string()));
        assert_eq!(meta["owner"], MetadataValue::Str(r#"{"user_id":3}"#.to_string()));
        assert_eq!(meta["last_edit_date"], MetadataValue::Str(String::new()));
        assert_eq!(meta["ratio"], MetadataValue::Float(0.5));
    }

    #[test]
    fn test_metadata_roundtrips_as_scalars() {
        let mut meta = Metadata::new();
        meta.insert("score".into(), MetadataValue::Int(3));
        meta.insert("ratio".into(), MetadataValue::Float(2.0));
        meta.insert("tags".into(), MetadataValue::Str("rust".into()));

        let text = serde_json::to_string(&meta).unwrap();
        let back: Metadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_truthiness() {
        assert!(!MetadataValue::Str(String::new()).is_truthy());
        assert!(!MetadataValue::Int(0).is_truthy());
        assert!(MetadataValue::Int(5).is_truthy());
        assert!(MetadataValue::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(MetadataValue::Int(12).to_string(), "12");
        assert_eq!(MetadataValue::Float(12.0).to_string(), "12.0");
        assert_eq!(MetadataValue::Str("abc".into()).to_string(), "abc");
    }
}
