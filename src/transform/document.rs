//! Typed-or-default access to a loosely typed JSON document.
//!
//! Upstream documents come from a document database export, so a field may be
//! missing, null, a plain JSON scalar, or an extended-JSON wrapper such as
//! `{"$oid": ..}`, `{"$date": ..}` or `{"$numberLong": ..}`. Every accessor
//! returns the field's value coerced to the requested type, or that type's
//! default when the field is absent or cannot be coerced.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

const OID: &str = "$oid";
const DATE: &str = "$date";
const NUMBER_WRAPPERS: [&str; 4] = ["$numberLong", "$numberInt", "$numberDouble", "$numberDecimal"];

#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Document<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Text, `""` when absent. Scalars are stringified, objects and arrays
    /// become their JSON text.
    pub fn text(&self, key: &str) -> String {
        self.opt_text(key).unwrap_or_default()
    }

    /// Text, `None` when absent or null
    pub fn opt_text(&self, key: &str) -> Option<String> {
        self.get(key).map(value_text)
    }

    /// Floating-point number, `0.0` when absent or not numeric
    pub fn number(&self, key: &str) -> f64 {
        self.get(key).and_then(value_f64).unwrap_or(0.0)
    }

    /// Integer, `0` when absent or not numeric; fractional values truncate
    pub fn integer(&self, key: &str) -> i64 {
        self.get(key).and_then(value_i64).unwrap_or(0)
    }

    /// Boolean, `false` when absent
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }

    /// Epoch-milliseconds timestamp in UTC; `None` when absent, zero or unparseable
    pub fn epoch_millis(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.get(key)?;
        let value = match value {
            Value::Object(map) => map.get(DATE)?,
            other => other,
        };

        match value {
            Value::String(s) => match s.parse::<i64>() {
                Ok(millis) => from_millis(millis),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            },
            other => value_i64(other).and_then(from_millis),
        }
    }

    /// Nested object, `None` when absent, not an object, or empty
    pub fn object(&self, key: &str) -> Option<Document<'a>> {
        match self.get(key) {
            Some(Value::Object(map)) if !map.is_empty() => Some(Document::new(map)),
            _ => None,
        }
    }

    /// Object id: `{"$oid": ".."}` unwrapped, plain scalars stringified.
    /// `None` when absent or empty.
    pub fn object_id(&self, key: &str) -> Option<String> {
        let id = match self.get(key)? {
            Value::Object(map) => map.get(OID).map(value_text)?,
            other => value_text(other),
        };
        (!id.is_empty()).then_some(id)
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

fn unwrap_number(value: &Value) -> &Value {
    if let Value::Object(map) = value {
        if let Some(inner) = NUMBER_WRAPPERS.iter().find_map(|k| map.get(*k)) {
            return inner;
        }
    }
    value
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match unwrap_number(value) {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match unwrap_number(value) {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults_for_absent_and_null() {
        let map = fields(json!({ "nothing": null }));
        let doc = Document::new(&map);

        assert_eq!(doc.text("missing"), "");
        assert_eq!(doc.text("nothing"), "");
        assert_eq!(doc.opt_text("nothing"), None);
        assert_eq!(doc.number("missing"), 0.0);
        assert_eq!(doc.integer("missing"), 0);
        assert!(!doc.flag("missing"));
        assert_eq!(doc.epoch_millis("missing"), None);
        assert!(doc.object("missing").is_none());
    }

    #[test]
    fn test_coercions() {
        let map = fields(json!({
            "amount": "12.5",
            "count": 7.9,
            "wrapped": { "$numberLong": "42" },
            "printed": "TRUE",
            "nested": { "a": [1, 2] },
            "list": ["x", "y"],
            "code": 17
        }));
        let doc = Document::new(&map);

        assert_eq!(doc.number("amount"), 12.5);
        assert_eq!(doc.integer("count"), 7);
        assert_eq!(doc.integer("wrapped"), 42);
        assert!(doc.flag("printed"));
        assert_eq!(doc.text("nested"), r#"{"a":[1,2]}"#);
        assert_eq!(doc.text("list"), r#"["x","y"]"#);
        assert_eq!(doc.text("code"), "17");
    }

    #[test]
    fn test_epoch_millis_forms() {
        let map = fields(json!({
            "plain": 1_700_000_000_000i64,
            "zero": 0,
            "date": { "$date": 1_700_000_000_000i64 },
            "iso": { "$date": "2023-11-14T22:13:20Z" },
            "long": { "$date": { "$numberLong": "1700000000000" } }
        }));
        let doc = Document::new(&map);
        let expected = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        assert_eq!(doc.epoch_millis("plain"), Some(expected));
        assert_eq!(doc.epoch_millis("zero"), None);
        assert_eq!(doc.epoch_millis("date"), Some(expected));
        assert_eq!(doc.epoch_millis("iso"), Some(expected));
        assert_eq!(doc.epoch_millis("long"), Some(expected));
    }

    #[test]
    fn test_object_id() {
        let map = fields(json!({
            "wrapped": { "$oid": "64f1c0ffee" },
            "plain": "abc",
            "empty": "",
            "other": { "no_oid": 1 }
        }));
        let doc = Document::new(&map);

        assert_eq!(doc.object_id("wrapped").as_deref(), Some("64f1c0ffee"));
        assert_eq!(doc.object_id("plain").as_deref(), Some("abc"));
        assert_eq!(doc.object_id("empty"), None);
        assert_eq!(doc.object_id("other"), None);
        assert_eq!(doc.object_id("missing"), None);
    }
}
