use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "avif",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoContent {
    File(PathBuf),
    Memory(Vec<u8>),
}

/// A photo handed to the session: its file name plus content the core never modifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    name: String,
    content: PhotoContent,
}

impl Photo {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            content: PhotoContent::File(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: PhotoContent::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &PhotoContent {
        &self.content
    }

    pub fn is_image(&self) -> bool {
        is_image_name(&self.name)
    }

    pub fn read_bytes(&self) -> Result<Cow<'_, [u8]>> {
        match &self.content {
            PhotoContent::Memory(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            PhotoContent::File(path) => fs::read(path)
                .map(Cow::Owned)
                .with_context(|| format!("无法读取照片: {}", path.display())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CollectOptions {
    pub recursive: bool,
    pub include_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub scanned_files: usize,
    pub image_files: usize,
    pub skipped_non_image: usize,
    pub skipped_hidden: usize,
}

/// Gathers image files under `root`, sorted by path.
pub fn collect_photos(
    root: &Path,
    options: &CollectOptions,
) -> Result<(Vec<Photo>, CollectStats)> {
    if !root.is_dir() {
        anyhow::bail!("照片文件夹不存在: {}", root.display());
    }

    let mut stats = CollectStats::default();
    let mut photos = Vec::new();
    let max_depth = if options.recursive { usize::MAX } else { 1 };

    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || options.include_hidden
                || !is_hidden(entry.path())
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("文件夹遍历失败: {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        stats.scanned_files += 1;

        if is_hidden(entry.path()) && !options.include_hidden {
            stats.skipped_hidden += 1;
            continue;
        }

        let photo = Photo::from_path(entry.into_path());
        if photo.is_image() {
            stats.image_files += 1;
            photos.push(photo);
        } else {
            stats.skipped_non_image += 1;
        }
    }

    Ok((photos, stats))
}

pub fn is_image_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|image_ext| ext.eq_ignore_ascii_case(image_ext))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
