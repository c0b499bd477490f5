use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map, Value};

/// Rows of a datastore search, in the order the portal returned them.
///
/// The column set is fixed by the first page. Later rows are aligned to it:
/// a missing key becomes `null` and keys outside the set are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Starts a table whose columns come from the first page.
    ///
    /// `advertised` is the portal's `fields` list; when empty, the keys of the
    /// first record are used in document order.
    pub(crate) fn with_schema(advertised: Vec<String>, first: Option<&Map<String, Value>>) -> Self {
        let columns = if advertised.is_empty() {
            first.map(|r| r.keys().cloned().collect()).unwrap_or_default()
        } else {
            advertised
        };
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub(crate) fn extend(&mut self, records: impl IntoIterator<Item = Map<String, Value>>) {
        for mut record in records {
            let row = self
                .columns
                .iter()
                .map(|c| record.remove(c).unwrap_or(Value::Null))
                .collect();
            self.rows.push(row);
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// A copy restricted to `columns`, in the order given. Unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let picked: Vec<(usize, String)> = columns
            .iter()
            .filter_map(|c| self.column_index(c.as_ref()).map(|i| (i, c.as_ref().to_string())))
            .collect();

        Table {
            columns: picked.iter().map(|(_, c)| c.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picked.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }

    /// Turns rows back into JSON objects keyed by column name.
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (c, v) in self.columns.iter().zip(self.values) {
            map.serialize_entry(c, v)?;
        }
        map.end()
    }
}

/// Serialises as an array of objects, one per row.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn schema_from_first_record_when_not_advertised() {
        let first = record(json!({"b": 1, "a": 2}));
        let table = Table::with_schema(Vec::new(), Some(&first));
        assert_eq!(table.columns(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn rows_are_aligned_to_first_schema() {
        let mut table = Table::with_schema(vec!["a".into(), "b".into()], None);
        table.extend([
            record(json!({"a": 1, "b": 2})),
            record(json!({"b": 3, "extra": true})),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "a"), Some(&Value::Null));
        assert_eq!(table.get(1, "b"), Some(&json!(3)));
        assert_eq!(table.get(1, "extra"), None);
        assert_eq!(table.column("b").unwrap(), vec![&json!(2), &json!(3)]);
    }

    #[test]
    fn select_restricts_columns() {
        let mut table = Table::with_schema(vec!["a".into(), "b".into(), "c".into()], None);
        table.extend([record(json!({"a": 1, "b": 2, "c": 3}))]);

        let sub = table.select(&["c", "a", "zzz"]);
        assert_eq!(sub.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(sub.rows(), &[vec![json!(3), json!(1)]]);
    }

    #[test]
    fn serialises_as_array_of_objects() {
        let mut table = Table::with_schema(vec!["z".into(), "a".into()], None);
        table.extend([record(json!({"a": "x", "z": 1}))]);

        let text = serde_json::to_string(&table).unwrap();
        assert_eq!(text, r#"[{"z":1,"a":"x"}]"#);

        let records = table.into_records();
        assert_eq!(records[0].get("a"), Some(&json!("x")));
    }

    #[test]
    fn empty_first_page_gives_empty_table() {
        let table = Table::with_schema(Vec::new(), None);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }
}
