use crate::row::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactName,
    Stem,
    Containment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMatch<'a> {
    pub index: usize,
    pub row: &'a Row,
    pub strategy: MatchStrategy,
}

/// Returns the row whose key column identifies `photo_name`, if any.
pub fn find_matching_row<'a>(
    photo_name: &str,
    rows: &'a [Row],
    key_column: &str,
) -> Option<&'a Row> {
    match_row(photo_name, rows, key_column).map(|found| found.row)
}

/// Exact name, then stem, then containment. The first row in sheet order wins each tier.
pub fn match_row<'a>(
    photo_name: &str,
    rows: &'a [Row],
    key_column: &str,
) -> Option<RowMatch<'a>> {
    if key_column.is_empty() {
        return None;
    }

    let stem = file_stem(photo_name);
    let keyed: Vec<(usize, &'a Row, &'a str)> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| row.get(key_column).map(|key| (index, row, key)))
        .collect();

    first_hit(&keyed, MatchStrategy::ExactName, |key| key == photo_name)
        .or_else(|| first_hit(&keyed, MatchStrategy::Stem, |key| key == stem))
        .or_else(|| {
            first_hit(&keyed, MatchStrategy::Containment, |key| {
                photo_name.contains(key) || key.contains(stem)
            })
        })
}

fn first_hit<'a>(
    keyed: &[(usize, &'a Row, &'a str)],
    strategy: MatchStrategy,
    accepts: impl Fn(&str) -> bool,
) -> Option<RowMatch<'a>> {
    keyed
        .iter()
        .find(|(_, _, key)| accepts(key))
        .map(|&(index, row, _)| RowMatch {
            index,
            row,
            strategy,
        })
}

/// Name with its final `.`-delimited extension removed; the whole name when there is no dot.
pub fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}

/// Final extension without the dot, if the name has one.
pub fn file_extension(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}
