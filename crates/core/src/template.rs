use crate::error::RenameError;
use crate::row::{column_set, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FormatPart {
    Column(String),
    Separator(String),
}

/// Ordered column / separator parts edited by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatTemplate {
    parts: Vec<FormatPart>,
}

impl FormatTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(parts: Vec<FormatPart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[FormatPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn push_column(&mut self, column: impl Into<String>) {
        self.parts.push(FormatPart::Column(column.into()));
    }

    pub fn push_separator(&mut self, separator: impl Into<String>) {
        let separator = separator.into();
        if !separator.is_empty() {
            self.parts.push(FormatPart::Separator(separator));
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<FormatPart> {
        (index < self.parts.len()).then(|| self.parts.remove(index))
    }

    pub fn move_part(&mut self, from: usize, to: usize) -> bool {
        if from >= self.parts.len() || to >= self.parts.len() {
            return false;
        }
        let part = self.parts.remove(from);
        self.parts.insert(to, part);
        true
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            FormatPart::Column(name) => Some(name.as_str()),
            FormatPart::Separator(_) => None,
        })
    }

    /// Flat template string consumed by [`expand`].
    pub fn to_template_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                FormatPart::Column(name) => write!(f, "{{{name}}}")?,
                FormatPart::Separator(text) => f.write_str(text)?,
            }
        }
        Ok(())
    }
}

/// Splits a flat template back into parts. Text outside placeholders becomes separators.
pub fn parse_format(template: &str) -> FormatTemplate {
    let parts = segments(template)
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => FormatPart::Separator(text.to_string()),
            Segment::Placeholder(inner) => FormatPart::Column(inner.to_string()),
        })
        .collect();
    FormatTemplate::from_parts(parts)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Expansion {
    pub text: String,
    /// Placeholders left in `text` verbatim, braces included.
    pub unresolved: Vec<String>,
}

impl Expansion {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn diagnostics(&self) -> Vec<RenameError> {
        self.unresolved
            .iter()
            .map(|placeholder| RenameError::UnresolvedPlaceholder(placeholder.clone()))
            .collect()
    }
}

/// Substitutes every `{column}` placeholder with the row value, leaving unresolved ones intact.
pub fn expand(template: &str, row: &Row) -> String {
    let expansion = expand_with_diagnostics(template, row);
    for diagnostic in expansion.diagnostics() {
        log::warn!("{diagnostic}");
    }
    expansion.text
}

pub fn expand_with_diagnostics(template: &str, row: &Row) -> Expansion {
    let mut expansion = Expansion {
        text: String::with_capacity(template.len()),
        unresolved: Vec::new(),
    };

    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => expansion.text.push_str(text),
            Segment::Placeholder(raw_key) => match resolve_column(row, raw_key) {
                Some(value) => expansion.text.push_str(value),
                None => {
                    let placeholder = format!("{{{raw_key}}}");
                    expansion.text.push_str(&placeholder);
                    expansion.unresolved.push(placeholder);
                }
            },
        }
    }

    expansion
}

/// Exact key first, then the annotation-stripped key compared by equality or containment.
pub fn resolve_column<'a>(row: &'a Row, raw_key: &str) -> Option<&'a str> {
    if let Some(value) = row.get(raw_key) {
        return Some(value);
    }

    let clean_key = strip_annotations(raw_key);
    row.iter()
        .find(|(key, _)| {
            *key == clean_key || clean_key.contains(key) || key.contains(clean_key.as_str())
        })
        .map(|(_, value)| value)
}

/// Removes `（...）` and `(...)` annotations such as `（必填）` and trims the result.
pub fn strip_annotations(raw_key: &str) -> String {
    let without_fullwidth = remove_enclosed(raw_key, '（', '）');
    remove_enclosed(&without_fullwidth, '(', ')')
        .trim()
        .to_string()
}

/// Renders the format against the first row as a live sample.
pub fn preview_sample(format: &FormatTemplate, rows: &[Row]) -> Option<Expansion> {
    if format.is_empty() {
        return None;
    }
    let first = rows.first()?;
    Some(expand_with_diagnostics(&format.to_template_string(), first))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub format_columns: Vec<String>,
    pub available_columns: Vec<String>,
    pub unresolved_columns: Vec<String>,
}

pub fn column_report(format: &FormatTemplate, rows: &[Row]) -> ColumnReport {
    let unresolved_columns = match rows.first() {
        Some(first) => format
            .columns()
            .filter(|column| resolve_column(first, column).is_none())
            .map(str::to_string)
            .collect(),
        None => format.columns().map(str::to_string).collect(),
    };

    ColumnReport {
        format_columns: format.columns().map(str::to_string).collect(),
        available_columns: column_set(rows),
        unresolved_columns,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

// A `{` that is not closed before the next brace stays literal text.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut literal_start = 0usize;
    let mut cursor = 0usize;

    while let Some(offset) = template[cursor..].find('{') {
        let open = cursor + offset;
        let inner_start = open + 1;
        let rest = &template[inner_start..];
        match rest.find(['{', '}']) {
            Some(end) if end > 0 && rest[end..].starts_with('}') => {
                if literal_start < open {
                    out.push(Segment::Literal(&template[literal_start..open]));
                }
                out.push(Segment::Placeholder(&rest[..end]));
                cursor = inner_start + end + 1;
                literal_start = cursor;
            }
            _ => cursor = inner_start,
        }
    }

    if literal_start < template.len() {
        out.push(Segment::Literal(&template[literal_start..]));
    }

    out
}

fn remove_enclosed(input: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(open) {
        let after_open = start + open.len_utf8();
        match rest[after_open..].find(close) {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[after_open + end + close.len_utf8()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    #[test]
    fn template_without_placeholders_is_returned_verbatim() {
        let data = row(&[("姓名", "张三")]);
        assert_eq!(expand("plain_name-01", &data), "plain_name-01");
        assert_eq!(expand("", &data), "");
    }

    #[test]
    fn exact_key_is_substituted() {
        let data = row(&[("姓名", "张三"), ("编号", "001")]);
        assert_eq!(expand("{编号}", &data), "001");
        assert_eq!(expand("{姓名}_{编号}", &data), "张三_001");
    }

    #[test]
    fn fullwidth_annotation_is_stripped() {
        let data = row(&[("姓名", "张三")]);
        assert_eq!(expand("{姓名（必填）}", &data), "张三");
    }

    #[test]
    fn ascii_annotation_is_stripped() {
        let data = row(&[("Name", "Alice")]);
        assert_eq!(expand("{Name (required)}", &data), "Alice");
    }

    #[test]
    fn annotated_column_header_resolves_from_plain_placeholder() {
        let data = row(&[("学号（选填）", "2024001")]);
        assert_eq!(expand("{学号}", &data), "2024001");
    }

    #[test]
    fn unresolved_placeholder_is_kept_and_reported() {
        let data = row(&[("姓名", "张三")]);
        let expansion = expand_with_diagnostics("{未知列}", &data);
        assert_eq!(expansion.text, "{未知列}");
        assert_eq!(expansion.unresolved, vec!["{未知列}".to_string()]);
        assert!(!expansion.is_complete());
        assert_eq!(
            expansion.diagnostics(),
            vec![RenameError::UnresolvedPlaceholder("{未知列}".to_string())]
        );
        assert_eq!(expand("{未知列}", &data), "{未知列}");
    }

    #[test]
    fn empty_row_leaves_every_placeholder() {
        let expansion = expand_with_diagnostics("{a}-{b}", &Row::new());
        assert_eq!(expansion.text, "{a}-{b}");
        assert_eq!(expansion.unresolved.len(), 2);
    }

    #[test]
    fn normalized_lookup_takes_first_key_in_row_order() {
        let data = row(&[("班级名称", "一班"), ("班级", "二班")]);
        assert_eq!(expand("{班级(必填)}", &data), "一班");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let data = row(&[("a", "{b}"), ("b", "x")]);
        assert_eq!(expand("{a}", &data), "{b}");
    }

    #[test]
    fn nested_braces_only_match_innermost() {
        let data = row(&[("b", "x")]);
        assert_eq!(expand("{a{b}}", &data), "{ax}");
        assert_eq!(expand("{}{b}", &data), "{}x");
    }

    #[test]
    fn annotation_only_placeholder_takes_first_column() {
        let data = row(&[("姓名", "张三"), ("编号", "001")]);
        assert_eq!(expand("{（备注）}", &data), "张三");
        assert_eq!(resolve_column(&data, "(备注)"), Some("张三"));
    }

    #[test]
    fn strip_annotations_handles_unclosed_parenthesis() {
        assert_eq!(strip_annotations(" 姓名（必填） "), "姓名");
        assert_eq!(strip_annotations("姓名(必填"), "姓名(必填");
        assert_eq!(strip_annotations("a(x)b（y）c"), "abc");
    }

    #[test]
    fn format_template_flattens_in_order() {
        let mut format = FormatTemplate::new();
        format.push_column("姓名");
        format.push_separator("_");
        format.push_column("编号");
        assert_eq!(format.to_template_string(), "{姓名}_{编号}");

        assert!(format.move_part(2, 0));
        assert_eq!(format.to_template_string(), "{编号}{姓名}_");
        assert_eq!(format.remove(2), Some(FormatPart::Separator("_".into())));
        assert_eq!(format.remove(5), None);
        assert!(!format.move_part(0, 9));
    }

    #[test]
    fn empty_separator_is_ignored() {
        let mut format = FormatTemplate::new();
        format.push_separator("");
        assert!(format.is_empty());
    }

    #[test]
    fn parse_format_splits_columns_and_separators() {
        let format = parse_format("{姓名}_{编号}.v{2");
        assert_eq!(
            format.parts(),
            &[
                FormatPart::Column("姓名".into()),
                FormatPart::Separator("_".into()),
                FormatPart::Column("编号".into()),
                FormatPart::Separator(".v{2".into()),
            ]
        );
    }

    #[test]
    fn format_parts_serialize_with_type_and_value() {
        let format = FormatTemplate::from_parts(vec![
            FormatPart::Column("姓名".into()),
            FormatPart::Separator("-".into()),
        ]);
        let json = serde_json::to_string(&format).expect("serialize");
        assert_eq!(
            json,
            r#"[{"type":"column","value":"姓名"},{"type":"separator","value":"-"}]"#
        );
        let back: FormatTemplate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, format);
    }

    #[test]
    fn preview_sample_uses_first_row() {
        let rows = vec![row(&[("姓名", "张三")]), row(&[("姓名", "李四")])];
        let format = parse_format("{姓名}_{班级}");
        let sample = preview_sample(&format, &rows).expect("sample");
        assert_eq!(sample.text, "张三_{班级}");
        assert_eq!(sample.unresolved, vec!["{班级}".to_string()]);

        assert!(preview_sample(&FormatTemplate::new(), &rows).is_none());
        assert!(preview_sample(&format, &[]).is_none());
    }

    #[test]
    fn column_report_lists_unresolved_format_columns() {
        let rows = vec![row(&[("姓名", "张三"), ("编号", "001")])];
        let report = column_report(&parse_format("{姓名（必填）}_{班级}"), &rows);
        assert_eq!(report.format_columns, vec!["姓名（必填）", "班级"]);
        assert_eq!(report.available_columns, vec!["姓名", "编号"]);
        assert_eq!(report.unresolved_columns, vec!["班级"]);
    }
}
