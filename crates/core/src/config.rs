use crate::sanitize::NamingOptions;
use crate::template::{FormatPart, FormatTemplate};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_KEY_COLUMN_HINTS: &[&str] = &["file", "photo", "image", "照片", "文件", "图片"];
pub const DEFAULT_MATCHED_FOLDER: &str = "已匹配";
pub const DEFAULT_UNMATCHED_FOLDER: &str = "未匹配";
pub const DEFAULT_ARCHIVE_NAME: &str = "renamed_photos.zip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub key_column_hints: Vec<String>,
    pub matched_folder: String,
    pub unmatched_folder: String,
    pub archive_name: String,
    pub sanitize: bool,
    pub max_filename_len: usize,
    pub recursive_default: bool,
    pub include_hidden_default: bool,
    pub format: Vec<FormatPart>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let naming = NamingOptions::default();
        Self {
            key_column_hints: DEFAULT_KEY_COLUMN_HINTS
                .iter()
                .map(|hint| hint.to_string())
                .collect(),
            matched_folder: DEFAULT_MATCHED_FOLDER.to_string(),
            unmatched_folder: DEFAULT_UNMATCHED_FOLDER.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            sanitize: naming.sanitize,
            max_filename_len: naming.max_filename_len,
            recursive_default: false,
            include_hidden_default: false,
            format: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn naming(&self) -> NamingOptions {
        NamingOptions {
            sanitize: self.sanitize,
            max_filename_len: self.max_filename_len,
        }
    }

    pub fn format_template(&self) -> FormatTemplate {
        FormatTemplate::from_parts(self.format.clone())
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "sheet-renamer", "sheet-renamer")
        .context("无法获取系统配置目录")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)
}

/// Missing file means defaults; a present but malformed file is an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw).context("配置文件解析失败")?;
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("无法创建配置目录: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("配置序列化失败")?;
    fs::write(path, body).with_context(|| format!("无法写入配置文件: {}", path.display()))?;
    Ok(())
}
