use crate::config::{AppConfig, DEFAULT_KEY_COLUMN_HINTS};
use crate::error::{Prerequisite, RenameError};
use crate::matcher::{file_extension, match_row, MatchStrategy};
use crate::photos::Photo;
use crate::row::{column_set, Row};
use crate::sanitize::{finalize_filename, reserve_unique_name, NamingOptions, FALLBACK_BASE_NAME};
use crate::spreadsheet::read_rows;
use crate::template::{expand, FormatTemplate};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub key_column_hints: Vec<String>,
    pub naming: NamingOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            key_column_hints: DEFAULT_KEY_COLUMN_HINTS
                .iter()
                .map(|hint| hint.to_string())
                .collect(),
            naming: NamingOptions::default(),
        }
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            key_column_hints: config.key_column_hints.clone(),
            naming: config.naming(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    DataLoaded,
    PhotosLoaded,
    Previewed,
    Processing,
    Downloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowLink {
    pub row_index: usize,
    pub strategy: MatchStrategy,
}

/// Outcome of matching one photo. Unmatched records keep the original name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    photo_index: usize,
    original_name: String,
    new_name: String,
    matched: Option<RowLink>,
}

impl MatchRecord {
    pub fn photo_index(&self) -> usize {
        self.photo_index
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn new_name(&self) -> &str {
        &self.new_name
    }

    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }

    pub fn row_index(&self) -> Option<usize> {
        self.matched.map(|link| link.row_index)
    }

    pub fn strategy(&self) -> Option<MatchStrategy> {
        self.matched.map(|link| link.strategy)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preview {
    records: Vec<MatchRecord>,
    matched: usize,
    unmatched: usize,
}

impl Preview {
    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn matched_count(&self) -> usize {
        self.matched
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Success {
    DataLoaded { rows: usize, columns: usize },
    PhotosLoaded { photos: usize, skipped: usize },
    AllMatched { matched: usize },
    PreviewRefreshed { matched: usize },
    Packaged { matched: usize, unmatched: usize },
}

/// Structured result of a session operation, rendered by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "detail", rename_all = "snake_case")]
pub enum Signal {
    Success(Success),
    Warning { matched: usize, unmatched: usize },
    Error(RenameError),
}

impl Signal {
    pub fn is_error(&self) -> bool {
        matches!(self, Signal::Error(_))
    }

    pub fn error(&self) -> Option<&RenameError> {
        match self {
            Signal::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Success(Success::DataLoaded { rows, .. }) => {
                write!(f, "已加载表格文件，共{rows}条数据")
            }
            Signal::Success(Success::PhotosLoaded { photos, .. }) => {
                write!(f, "已加载{photos}张照片")
            }
            Signal::Success(Success::AllMatched { .. }) => f.write_str("所有照片已成功匹配"),
            Signal::Success(Success::PreviewRefreshed { .. }) => f.write_str("预览已更新"),
            Signal::Success(Success::Packaged { matched, unmatched }) => write!(
                f,
                "照片已重命名并打包 (已匹配 {matched} 张, 未匹配 {unmatched} 张)"
            ),
            Signal::Warning { unmatched, .. } => {
                write!(f, "有{unmatched}张照片未匹配到表格数据")
            }
            Signal::Error(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile<'a> {
    pub name: String,
    pub photo: &'a Photo,
}

/// The two disjoint output groups handed to an archive writer or folder export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameTargets<'a> {
    pub matched: Vec<TargetFile<'a>>,
    pub unmatched: Vec<TargetFile<'a>>,
}

impl RenameTargets<'_> {
    pub fn len(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.unmatched.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenameSession {
    options: SessionOptions,
    rows: Vec<Row>,
    columns: Vec<String>,
    photos: Vec<Photo>,
    key_column: Option<String>,
    format: FormatTemplate,
    preview: Option<Preview>,
    processing: bool,
    packaged: bool,
}

impl RenameSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn key_column(&self) -> Option<&str> {
        self.key_column.as_deref()
    }

    pub fn format(&self) -> &FormatTemplate {
        &self.format
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Set only while [`package`](Self::package) runs its sink. `package` takes `&mut self`,
    /// so a second packaging run cannot start before the first returns.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn state(&self) -> SessionState {
        if self.processing {
            SessionState::Processing
        } else if self.preview.is_some() {
            if self.packaged {
                SessionState::Downloaded
            } else {
                SessionState::Previewed
            }
        } else if !self.photos.is_empty() {
            SessionState::PhotosLoaded
        } else if !self.rows.is_empty() {
            SessionState::DataLoaded
        } else {
            SessionState::Empty
        }
    }

    pub fn load_spreadsheet(&mut self, path: &Path) -> Signal {
        match read_rows(path) {
            Ok(rows) => self.load_data(rows),
            Err(err) => Signal::Error(RenameError::ParseFailure(format!("{err:#}"))),
        }
    }

    /// Replaces the row set. An empty set is rejected and leaves the session untouched.
    pub fn load_data(&mut self, rows: Vec<Row>) -> Signal {
        if rows.is_empty() {
            return Signal::Error(RenameError::EmptyDataset);
        }

        self.columns = column_set(&rows);
        self.rows = rows;
        log::debug!("spreadsheet columns: {:?}", self.columns);
        self.clear_preview();
        self.ensure_key_column();

        Signal::Success(Success::DataLoaded {
            rows: self.rows.len(),
            columns: self.columns.len(),
        })
    }

    /// Replaces the photo list with the image files among `photos`.
    pub fn load_photos(&mut self, photos: Vec<Photo>) -> Signal {
        let total = photos.len();
        self.photos = photos.into_iter().filter(Photo::is_image).collect();
        self.clear_preview();

        Signal::Success(Success::PhotosLoaded {
            photos: self.photos.len(),
            skipped: total - self.photos.len(),
        })
    }

    pub fn select_key_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if self.key_column.as_deref() == Some(column.as_str()) {
            return;
        }
        self.key_column = Some(column);
        self.clear_preview();
    }

    /// Template edits keep the current matches; the next [`build_preview`](Self::build_preview) renames them.
    pub fn set_format(&mut self, format: FormatTemplate) {
        self.format = format;
    }

    /// Matches photos on the first call; afterwards only recomputes names of matched records.
    pub fn build_preview(&mut self) -> Signal {
        if let Some(existing) = &self.preview {
            let refreshed = self.refresh_names(existing);
            let matched = refreshed.matched;
            self.preview = Some(refreshed);
            self.packaged = false;
            return Signal::Success(Success::PreviewRefreshed { matched });
        }

        if let Err(err) = self.check_match_inputs() {
            return Signal::Error(err);
        }

        let preview = self.match_photos();
        log::info!(
            "matched {} of {} photos",
            preview.matched,
            preview.records.len()
        );

        let signal = if preview.unmatched > 0 {
            Signal::Warning {
                matched: preview.matched,
                unmatched: preview.unmatched,
            }
        } else {
            Signal::Success(Success::AllMatched {
                matched: preview.matched,
            })
        };
        self.preview = Some(preview);
        self.packaged = false;
        signal
    }

    /// Matched photos keyed by new name, unmatched by original name. Clashing names get a numeric suffix.
    pub fn build_targets(&self) -> Result<RenameTargets<'_>, RenameError> {
        let preview = self
            .preview
            .as_ref()
            .ok_or(RenameError::PreconditionUnmet(Prerequisite::Preview))?;

        let mut targets = RenameTargets::default();
        let mut matched_names = HashSet::new();
        let mut unmatched_names = HashSet::new();

        for record in &preview.records {
            let photo = self.photos.get(record.photo_index).ok_or_else(|| {
                RenameError::ProcessingFailed(format!("照片已不存在: {}", record.original_name))
            })?;
            if record.is_matched() {
                targets.matched.push(TargetFile {
                    name: reserve_unique_name(&record.new_name, &mut matched_names),
                    photo,
                });
            } else {
                targets.unmatched.push(TargetFile {
                    name: reserve_unique_name(&record.original_name, &mut unmatched_names),
                    photo,
                });
            }
        }

        Ok(targets)
    }

    /// Hands the targets to `sink` (archive writer, folder export) while the processing flag is set.
    pub fn package<F>(&mut self, sink: F) -> Signal
    where
        F: FnOnce(&RenameTargets<'_>) -> anyhow::Result<()>,
    {
        if self.preview.is_none() {
            return Signal::Error(RenameError::PreconditionUnmet(Prerequisite::Preview));
        }

        self.processing = true;
        let outcome = self.build_targets().and_then(|targets| {
            sink(&targets).map_err(RenameError::processing)?;
            Ok((targets.matched.len(), targets.unmatched.len()))
        });
        self.processing = false;

        match outcome {
            Ok((matched, unmatched)) => {
                self.packaged = true;
                Signal::Success(Success::Packaged { matched, unmatched })
            }
            Err(err) => {
                log::warn!("packaging failed: {err}");
                Signal::Error(err)
            }
        }
    }

    fn clear_preview(&mut self) {
        self.preview = None;
        self.packaged = false;
    }

    fn ensure_key_column(&mut self) {
        if let Some(current) = &self.key_column {
            if self.columns.contains(current) {
                return;
            }
        }
        self.key_column = default_key_column(&self.columns, &self.options.key_column_hints);
    }

    fn check_match_inputs(&self) -> Result<(), RenameError> {
        if self.rows.is_empty() {
            return Err(RenameError::PreconditionUnmet(Prerequisite::Rows));
        }
        if self.photos.is_empty() {
            return Err(RenameError::PreconditionUnmet(Prerequisite::Photos));
        }
        if self.key_column.as_deref().map_or(true, str::is_empty) {
            return Err(RenameError::PreconditionUnmet(Prerequisite::KeyColumn));
        }
        Ok(())
    }

    fn match_photos(&self) -> Preview {
        let key_column = self.key_column.as_deref().unwrap_or_default();
        let mut preview = Preview::default();

        for (photo_index, photo) in self.photos.iter().enumerate() {
            let original_name = photo.name().to_string();
            let record = match match_row(&original_name, &self.rows, key_column) {
                Some(found) => {
                    preview.matched += 1;
                    MatchRecord {
                        photo_index,
                        new_name: self.target_name(found.row, &original_name),
                        original_name,
                        matched: Some(RowLink {
                            row_index: found.index,
                            strategy: found.strategy,
                        }),
                    }
                }
                None => {
                    preview.unmatched += 1;
                    MatchRecord {
                        photo_index,
                        new_name: original_name.clone(),
                        original_name,
                        matched: None,
                    }
                }
            };
            preview.records.push(record);
        }

        preview
    }

    fn refresh_names(&self, existing: &Preview) -> Preview {
        let mut refreshed = existing.clone();
        for record in &mut refreshed.records {
            let Some(row) = record.row_index().and_then(|index| self.rows.get(index)) else {
                continue;
            };
            record.new_name = self.target_name(row, &record.original_name);
        }
        refreshed
    }

    fn target_name(&self, row: &Row, original_name: &str) -> String {
        let base = if self.format.is_empty() {
            row.first_value()
                .filter(|value| !value.is_empty())
                .unwrap_or(FALLBACK_BASE_NAME)
                .to_string()
        } else {
            expand(&self.format.to_template_string(), row)
        };
        finalize_filename(&base, file_extension(original_name), &self.options.naming)
    }
}

/// First column whose name contains a filename hint (case-insensitive), else the first column.
pub fn default_key_column(columns: &[String], hints: &[String]) -> Option<String> {
    columns
        .iter()
        .find(|column| {
            let lower = column.to_lowercase();
            hints
                .iter()
                .any(|hint| !hint.is_empty() && lower.contains(&hint.to_lowercase()))
        })
        .or_else(|| columns.first())
        .cloned()
}
