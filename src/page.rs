use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One decoded page of `datastore/search.json`.
#[derive(Debug)]
pub(crate) struct Page {
    pub(crate) total: u64,
    pub(crate) limit: u64,
    /// Column order advertised by the portal, empty when it sent none.
    pub(crate) columns: Vec<String>,
    pub(crate) records: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(deserialize_with = "count")]
    total: u64,
    #[serde(deserialize_with = "count")]
    limit: u64,
    records: Vec<Map<String, Value>>,
    #[serde(default)]
    fields: Vec<FieldInfo>,
}

#[derive(Debug, Deserialize)]
struct FieldInfo {
    id: String,
}

// DKAN 7 serialises counts as strings ("250"); newer builds send numbers.
fn count<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(d)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a numeric count, got \"{}\"", s))),
    }
}

pub(crate) fn parse_page(url: &str, mut body: Value) -> Result<Page> {
    let result = match body.get_mut("result") {
        Some(result) if result.is_object() => result.take(),
        _ => {
            let detail = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(|m| format!(" (portal said: {})", m))
                .unwrap_or_default();
            return Err(Error::schema(
                url,
                format!("response has no `result` object{}", detail),
            ));
        }
    };

    let parsed: SearchResult = serde_json::from_value(result)
        .map_err(|e| Error::schema(url, format!("malformed `result`: {}", e)))?;

    Ok(Page {
        total: parsed.total,
        limit: parsed.limit,
        columns: parsed.fields.into_iter().map(|f| f.id).collect(),
        records: parsed.records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_counts() {
        let body = json!({
            "help": "Search a datastore table.",
            "success": true,
            "result": {
                "resource_id": "abc",
                "fields": [{"id": "state", "type": "text"}, {"id": "units", "type": "int"}],
                "total": "250",
                "limit": "100",
                "records": [{"state": "AK", "units": "3"}]
            }
        });
        let page = parse_page("u", body).unwrap();
        assert_eq!(page.total, 250);
        assert_eq!(page.limit, 100);
        assert_eq!(page.columns, vec!["state", "units"]);
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn parses_numeric_counts_without_fields() {
        let body = json!({"result": {"total": 3, "limit": 100, "records": []}});
        let page = parse_page("u", body).unwrap();
        assert_eq!(page.total, 3);
        assert!(page.columns.is_empty());
        assert!(page.records.is_empty());
    }

    #[test]
    fn missing_result_is_schema_error() {
        let err = parse_page("u", json!({"success": true})).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));

        let err = parse_page(
            "u",
            json!({"success": false, "error": {"message": "Resource not found"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Resource not found"));
    }

    #[test]
    fn missing_or_bad_fields_are_schema_errors() {
        for body in [
            json!({"result": {"limit": 100, "records": []}}),
            json!({"result": {"total": 1, "records": []}}),
            json!({"result": {"total": 1, "limit": 100}}),
            json!({"result": {"total": "many", "limit": 100, "records": []}}),
            json!({"result": {"total": 1, "limit": 100, "records": "nope"}}),
        ] {
            let err = parse_page("u", body).unwrap_err();
            assert!(matches!(err, Error::Schema { .. }), "{err:?}");
        }
    }
}
