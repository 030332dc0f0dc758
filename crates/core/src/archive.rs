use crate::config::{AppConfig, DEFAULT_MATCHED_FOLDER, DEFAULT_UNMATCHED_FOLDER};
use crate::photos::PhotoContent;
use crate::sanitize::is_plain_file_name;
use crate::session::{RenameTargets, TargetFile};
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub matched_folder: String,
    pub unmatched_folder: String,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            matched_folder: DEFAULT_MATCHED_FOLDER.to_string(),
            unmatched_folder: DEFAULT_UNMATCHED_FOLDER.to_string(),
        }
    }
}

impl From<&AppConfig> for ArchiveLayout {
    fn from(config: &AppConfig) -> Self {
        Self {
            matched_folder: config.matched_folder.clone(),
            unmatched_folder: config.unmatched_folder.clone(),
        }
    }
}

impl ArchiveLayout {
    // Folder and file names must stay single components so nothing lands outside the output.
    fn placements<'t, 'a>(
        &'t self,
        targets: &'t RenameTargets<'a>,
    ) -> Result<Vec<(&'t str, &'t TargetFile<'a>)>> {
        for folder in [&self.matched_folder, &self.unmatched_folder] {
            if !is_plain_file_name(folder) {
                bail!("无效的输出文件夹名: {folder}");
            }
        }
        if let Some(target) = targets
            .matched
            .iter()
            .chain(&targets.unmatched)
            .find(|target| !is_plain_file_name(&target.name))
        {
            bail!("无效的目标文件名: {}", target.name);
        }

        Ok(targets
            .matched
            .iter()
            .map(|target| (self.matched_folder.as_str(), target))
            .chain(
                targets
                    .unmatched
                    .iter()
                    .map(|target| (self.unmatched_folder.as_str(), target)),
            )
            .collect())
    }
}

/// Writes matched photos under `matched_folder/` and the rest under `unmatched_folder/`.
pub fn write_archive<W: Write + Seek>(
    targets: &RenameTargets<'_>,
    layout: &ArchiveLayout,
    writer: W,
) -> Result<W> {
    let placements = layout.placements(targets)?;
    let entries = placements
        .par_iter()
        .map(|(folder, target)| {
            let bytes = target.photo.read_bytes()?;
            Ok((format!("{folder}/{}", target.name), bytes))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for folder in [&layout.matched_folder, &layout.unmatched_folder] {
        zip.add_directory(format!("{folder}/"), options)
            .with_context(|| format!("无法创建压缩包目录: {folder}"))?;
    }

    for (entry_name, bytes) in &entries {
        zip.start_file(entry_name.as_str(), options)
            .with_context(|| format!("无法写入压缩包条目: {entry_name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("无法写入压缩包条目: {entry_name}"))?;
    }

    let writer = zip.finish().context("压缩包生成失败")?;
    log::info!("archived {} photos", entries.len());
    Ok(writer)
}

/// Writes the archive to `path`; a partially written file is removed on failure.
pub fn write_archive_file(
    targets: &RenameTargets<'_>,
    layout: &ArchiveLayout,
    path: &Path,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("无法创建输出目录: {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("无法创建压缩包: {}", path.display()))?;

    let result = write_archive(targets, layout, BufWriter::new(file)).and_then(|mut writer| {
        writer
            .flush()
            .with_context(|| format!("无法写入压缩包: {}", path.display()))
    });

    if let Err(err) = result {
        if let Err(cleanup_err) = fs::remove_file(path) {
            log::warn!("failed to remove partial archive {}: {cleanup_err}", path.display());
        }
        return Err(err);
    }
    Ok(())
}

/// Copies photos into `out_dir/matched_folder` and `out_dir/unmatched_folder`.
/// Existing files are never overwritten; on failure every file and folder created here is removed.
pub fn export_to_directory(
    targets: &RenameTargets<'_>,
    layout: &ArchiveLayout,
    out_dir: &Path,
) -> Result<()> {
    let placements: Vec<(PathBuf, &TargetFile<'_>)> = layout
        .placements(targets)?
        .into_iter()
        .map(|(folder, target)| (out_dir.join(folder).join(&target.name), target))
        .collect();

    for (path, _) in &placements {
        if path.exists() {
            bail!("目标文件已存在: {}", path.display());
        }
    }

    let mut created_dirs = Vec::new();
    if !out_dir.exists() {
        created_dirs.push(out_dir.to_path_buf());
    }
    for folder in [&layout.matched_folder, &layout.unmatched_folder] {
        let dir = out_dir.join(folder);
        if !dir.exists() {
            created_dirs.push(dir.clone());
        }
        if let Err(err) = fs::create_dir_all(&dir) {
            rollback_export(&[], &created_dirs);
            return Err(anyhow::Error::from(err)
                .context(format!("无法创建输出目录: {}", dir.display())));
        }
    }

    let copied = placements
        .par_iter()
        .try_for_each(|(path, target)| -> Result<()> {
            match target.photo.content() {
                PhotoContent::File(source) => {
                    fs::copy(source, path).with_context(|| {
                        format!("复制失败: {} -> {}", source.display(), path.display())
                    })?;
                }
                PhotoContent::Memory(bytes) => {
                    fs::write(path, bytes)
                        .with_context(|| format!("写入失败: {}", path.display()))?;
                }
            }
            Ok(())
        });

    if let Err(err) = copied {
        rollback_export(&placements, &created_dirs);
        return Err(err);
    }

    log::info!("exported {} photos to {}", placements.len(), out_dir.display());
    Ok(())
}

// Every placement path was checked to be absent beforehand, so any file there now is ours.
fn rollback_export(placements: &[(PathBuf, &TargetFile<'_>)], created_dirs: &[PathBuf]) {
    for (path, _) in placements {
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                log::warn!("failed to remove exported file {}: {err}", path.display());
            }
        }
    }
    for dir in created_dirs.iter().rev() {
        if let Err(err) = fs::remove_dir(dir) {
            log::warn!("failed to remove output folder {}: {err}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photos::Photo;
    use std::io::{Cursor, Read};
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn targets<'a>(matched: &'a Photo, unmatched: &'a Photo) -> RenameTargets<'a> {
        RenameTargets {
            matched: vec![TargetFile {
                name: "张三_001.jpg".to_string(),
                photo: matched,
            }],
            unmatched: vec![TargetFile {
                name: "other.jpg".to_string(),
                photo: unmatched,
            }],
        }
    }

    #[test]
    fn archive_groups_photos_into_two_folders() {
        let matched = Photo::from_bytes("001.jpg", b"matched-bytes".to_vec());
        let unmatched = Photo::from_bytes("other.jpg", b"other-bytes".to_vec());
        let targets = targets(&matched, &unmatched);

        let cursor = write_archive(&targets, &ArchiveLayout::default(), Cursor::new(Vec::new()))
            .expect("archive");
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).expect("open zip");

        let mut content = Vec::new();
        archive
            .by_name("已匹配/张三_001.jpg")
            .expect("matched entry")
            .read_to_end(&mut content)
            .expect("read");
        assert_eq!(content, b"matched-bytes");

        content.clear();
        archive
            .by_name("未匹配/other.jpg")
            .expect("unmatched entry")
            .read_to_end(&mut content)
            .expect("read");
        assert_eq!(content, b"other-bytes");
    }

    #[test]
    fn archive_file_reads_photos_from_disk() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("001.jpg");
        fs::write(&source, b"on-disk").expect("write");
        let matched = Photo::from_path(&source);
        let unmatched = Photo::from_bytes("x.png", b"x".to_vec());
        let targets = targets(&matched, &unmatched);

        let path = temp.path().join("out").join("renamed_photos.zip");
        write_archive_file(&targets, &ArchiveLayout::default(), &path).expect("archive");

        let mut archive = ZipArchive::new(File::open(&path).expect("open")).expect("open zip");
        let mut content = String::new();
        archive
            .by_name("已匹配/张三_001.jpg")
            .expect("entry")
            .read_to_string(&mut content)
            .expect("read");
        assert_eq!(content, "on-disk");
    }

    #[test]
    fn missing_source_removes_partial_archive() {
        let temp = tempdir().expect("tempdir");
        let matched = Photo::from_path(temp.path().join("gone.jpg"));
        let unmatched = Photo::from_bytes("x.png", b"x".to_vec());
        let targets = targets(&matched, &unmatched);

        let path = temp.path().join("renamed_photos.zip");
        let err = write_archive_file(&targets, &ArchiveLayout::default(), &path)
            .expect_err("must fail");
        assert!(err.to_string().contains("无法读取照片"));
        assert!(!path.exists());
    }

    #[test]
    fn export_copies_into_folders_without_touching_sources() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("001.jpg");
        fs::write(&source, b"on-disk").expect("write");
        let matched = Photo::from_path(&source);
        let unmatched = Photo::from_bytes("other.jpg", b"mem".to_vec());
        let targets = targets(&matched, &unmatched);

        let out = temp.path().join("export");
        let layout = ArchiveLayout {
            matched_folder: "matched".into(),
            unmatched_folder: "unmatched".into(),
        };
        export_to_directory(&targets, &layout, &out).expect("export");

        assert_eq!(
            fs::read(out.join("matched").join("张三_001.jpg")).expect("read"),
            b"on-disk"
        );
        assert_eq!(
            fs::read(out.join("unmatched").join("other.jpg")).expect("read"),
            b"mem"
        );
        assert!(source.exists());
    }

    #[test]
    fn failed_export_removes_copied_files() {
        let temp = tempdir().expect("tempdir");
        let missing = Photo::from_path(temp.path().join("gone.jpg"));
        let present = Photo::from_bytes("other.jpg", b"mem".to_vec());
        let targets = RenameTargets {
            matched: vec![
                TargetFile {
                    name: "a.jpg".to_string(),
                    photo: &present,
                },
                TargetFile {
                    name: "b.jpg".to_string(),
                    photo: &missing,
                },
            ],
            unmatched: vec![TargetFile {
                name: "other.jpg".to_string(),
                photo: &present,
            }],
        };

        let out = temp.path().join("export");
        let err = export_to_directory(&targets, &ArchiveLayout::default(), &out)
            .expect_err("must fail");
        assert!(err.to_string().contains("复制失败"));
        assert!(!out.join("已匹配").join("a.jpg").exists());
        assert!(!out.join("未匹配").join("other.jpg").exists());
        assert!(!out.exists());
    }

    #[test]
    fn path_like_target_names_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let matched = Photo::from_bytes("001.jpg", b"a".to_vec());
        let unmatched = Photo::from_bytes("other.jpg", b"b".to_vec());
        let mut targets = targets(&matched, &unmatched);
        targets.matched[0].name = "../../escaped.jpg".to_string();

        let out = temp.path().join("a").join("out");
        let err = export_to_directory(&targets, &ArchiveLayout::default(), &out)
            .expect_err("must fail");
        assert!(err.to_string().contains("无效的目标文件名"));
        assert!(!temp.path().join("escaped.jpg").exists());

        let err = write_archive(&targets, &ArchiveLayout::default(), Cursor::new(Vec::new()))
            .expect_err("must fail");
        assert!(err.to_string().contains("无效的目标文件名"));
    }

    #[test]
    fn export_refuses_to_overwrite() {
        let temp = tempdir().expect("tempdir");
        let matched = Photo::from_bytes("001.jpg", b"a".to_vec());
        let unmatched = Photo::from_bytes("other.jpg", b"b".to_vec());
        let targets = targets(&matched, &unmatched);

        let out = temp.path();
        fs::create_dir_all(out.join("已匹配")).expect("mkdir");
        fs::write(out.join("已匹配").join("张三_001.jpg"), b"old").expect("write");

        let err = export_to_directory(&targets, &ArchiveLayout::default(), out)
            .expect_err("must fail");
        assert!(err.to_string().contains("目标文件已存在"));
        assert_eq!(
            fs::read(out.join("已匹配").join("张三_001.jpg")).expect("read"),
            b"old"
        );
    }
}
