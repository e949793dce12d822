//! Build [`AbstractInfo`] values from full records.

use serde::Serialize;
use serde_json::Value;

use crate::compare::parse_lastmod;
use crate::types::{AbstractInfo, AbstractKey};

/// Summarise `record` using the `unique_key` / `time_key` selectors.
///
/// `None` in, `None` out: an absent record has no abstract. A missing id
/// becomes `""` and a missing or unreadable time becomes `0`.
pub fn create_abstract<T: Serialize>(
    record: Option<&T>,
    keys: &AbstractKey,
) -> Result<Option<AbstractInfo>, serde_json::Error> {
    let Some(record) = record else {
        return Ok(None);
    };
    let value = serde_json::to_value(record)?;
    let id = select(&value, &keys.unique_key)
        .map(id_string)
        .unwrap_or_default();
    let update_at = select(&value, &keys.time_key)
        .and_then(timestamp_millis)
        .unwrap_or(0);
    Ok(Some(AbstractInfo::new(id, update_at)))
}

/// Logical update time of `record`, `0` when the time field is absent.
pub fn update_time_of<T: Serialize>(record: &T, keys: &AbstractKey) -> Result<i64, serde_json::Error> {
    let value = serde_json::to_value(record)?;
    Ok(select(&value, &keys.time_key)
        .and_then(timestamp_millis)
        .unwrap_or(0))
}

/// Look up a dot-separated path. Numeric segments index into arrays.
pub fn select<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| parse_lastmod(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_record_has_no_abstract() {
        let none: Option<&Value> = None;
        assert_eq!(create_abstract(none, &AbstractKey::default()).expect("abstract"), None);
    }

    #[test]
    fn reads_default_selectors() {
        let record = json!({"id": "n1", "updateAt": 1700, "body": "hello"});
        let info = create_abstract(Some(&record), &AbstractKey::default())
            .expect("abstract")
            .expect("present");
        assert_eq!(info, AbstractInfo::new("n1", 1700));
    }

    #[test]
    fn nested_selectors_and_numeric_ids() {
        let keys = AbstractKey {
            time_key: "meta.modified".to_string(),
            unique_key: "key".to_string(),
        };
        let record = json!({"key": 42, "meta": {"modified": "2024-10-01T00:00:00Z"}});
        let info = create_abstract(Some(&record), &keys)
            .expect("abstract")
            .expect("present");
        assert_eq!(info.id, "42");
        assert_eq!(info.update_at, 1_727_740_800_000);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let record = json!({"body": "orphan"});
        let info = create_abstract(Some(&record), &AbstractKey::default())
            .expect("abstract")
            .expect("present");
        assert_eq!(info, AbstractInfo::new("", 0));
    }

    #[test]
    fn select_indexes_arrays() {
        let value = json!({"revs": [{"at": 1}, {"at": 2}]});
        assert_eq!(select(&value, "revs.1.at"), Some(&json!(2)));
        assert_eq!(select(&value, "revs.9.at"), None);
    }

    #[test]
    fn update_time_of_defaults_to_zero() {
        let keys = AbstractKey::default();
        assert_eq!(update_time_of(&json!({"updateAt": 7}), &keys).expect("time"), 7);
        assert_eq!(update_time_of(&json!({}), &keys).expect("time"), 0);
    }
}
