use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// One spreadsheet record. Cells keep the sheet's column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(key, _)| *key == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.cells.iter().any(|(key, _)| key == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn first_value(&self) -> Option<&str> {
        self.cells.first().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Columns of the first row; every other row is assumed to share them.
pub fn column_set(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Distinct values of `column` in first-seen order. Rows without the cell are skipped.
pub fn unique_values<'a>(rows: &'a [Row], column: &str) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| seen.insert(*value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{column_set, unique_values, Row};

    #[test]
    fn insert_keeps_column_order_and_overwrites_in_place() {
        let mut row = Row::new();
        row.insert("编号", "001");
        row.insert("姓名", "张三");
        row.insert("编号", "002");

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["编号", "姓名"]);
        assert_eq!(row.get("编号"), Some("002"));
        assert_eq!(row.first_value(), Some("002"));
    }

    #[test]
    fn column_set_uses_first_row_only() {
        let rows = vec![
            Row::from_iter([("a", "1"), ("b", "2")]),
            Row::from_iter([("a", "3"), ("c", "4")]),
        ];
        assert_eq!(column_set(&rows), vec!["a".to_string(), "b".to_string()]);
        assert!(column_set(&[]).is_empty());
    }

    #[test]
    fn unique_values_skips_duplicates_and_missing_cells() {
        let rows = vec![
            Row::from_iter([("班级", "一班")]),
            Row::from_iter([("姓名", "李四")]),
            Row::from_iter([("班级", "二班")]),
            Row::from_iter([("班级", "一班")]),
        ];
        assert_eq!(unique_values(&rows, "班级"), vec!["一班", "二班"]);
    }

    #[test]
    fn serializes_as_ordered_json_object() {
        let row = Row::from_iter([("z", "1"), ("a", "2")]);
        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, r#"{"z":"1","a":"2"}"#);
    }
}
