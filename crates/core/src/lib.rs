mod archive;
mod config;
mod error;
mod matcher;
mod photos;
mod row;
mod sanitize;
mod session;
mod spreadsheet;
mod template;

pub use archive::{export_to_directory, write_archive, write_archive_file, ArchiveLayout};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use error::{Prerequisite, RenameError};
pub use matcher::{file_extension, file_stem, find_matching_row, match_row, MatchStrategy, RowMatch};
pub use photos::{collect_photos, is_image_name, CollectOptions, CollectStats, Photo, PhotoContent};
pub use row::{column_set, unique_values, Row};
pub use sanitize::{finalize_filename, sanitize_filename, NamingOptions};
pub use session::{
    default_key_column, MatchRecord, Preview, RenameSession, RenameTargets, RowLink, SessionOptions,
    SessionState, Signal, Success, TargetFile,
};
pub use spreadsheet::{read_delimited, read_rows};
pub use template::{
    column_report, expand, expand_with_diagnostics, parse_format, preview_sample, resolve_column,
    strip_annotations, ColumnReport, Expansion, FormatPart, FormatTemplate,
};
