/*!
 * Per-book export.
 *
 * Layout under the output root:
 *
 * ```text
 * <title>/chapters1-3/chapters1-3.mp3
 * <title>/chapters1-3/chapters1-3.lrc
 * <title>.zip
 * ```
 *
 * The book directory is rebuilt from scratch on every run, so exporting the
 * same data twice gives the same tree.
 */

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::ExportConfig;
use crate::audio::{AudioMerger, MergeSettings};
use crate::caption;
use crate::database::{BookRecord, ParagraphStore};
use crate::export::grouping::{group_chapters, ChapterContent, ExportGroup};
use crate::file_utils::FileManager;
use crate::synthesis::ProgressCallback;

/// Outcome of one output segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentResult {
    pub folder: String,
    pub chapter_indices: Vec<i64>,
    pub duration_ms: i64,
    pub audio_path: Option<PathBuf>,
    pub caption_path: Option<PathBuf>,
    pub success: bool,
    pub error: Option<String>,
}

/// Outcome of a book export
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub success: bool,
    pub message: String,
    pub output_dir: PathBuf,
    pub total_segments: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub segments: Vec<SegmentResult>,
    pub archive: Option<PathBuf>,
}

impl ExportResult {
    fn failure(output_dir: PathBuf, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output_dir,
            total_segments: 0,
            success_count: 0,
            fail_count: 0,
            segments: Vec::new(),
            archive: None,
        }
    }
}

pub struct ExportOrchestrator {
    store: Arc<dyn ParagraphStore>,
    config: ExportConfig,
    output_root: PathBuf,
    audio_dir: PathBuf,
    merger: AudioMerger,
}

impl ExportOrchestrator {
    pub fn new(
        store: Arc<dyn ParagraphStore>,
        config: ExportConfig,
        output_root: impl Into<PathBuf>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        let merger = AudioMerger::new(MergeSettings::from(&config));
        Self {
            store,
            config,
            output_root: output_root.into(),
            audio_dir: audio_dir.into(),
            merger,
        }
    }

    /// Directory name of a book under the output root
    pub fn book_folder_name(book: &BookRecord) -> String {
        let name = FileManager::sanitize_filename(&book.title);
        if name.is_empty() {
            format!("book_{}", book.id)
        } else {
            name
        }
    }

    pub fn book_output_dir(&self, book: &BookRecord) -> PathBuf {
        self.output_root.join(Self::book_folder_name(book))
    }

    pub fn archive_path(&self, book: &BookRecord) -> PathBuf {
        self.output_root
            .join(format!("{}.zip", Self::book_folder_name(book)))
    }

    pub async fn export(&self, book: &BookRecord) -> Result<ExportResult> {
        self.export_with_progress(book, None).await
    }

    pub async fn export_with_progress(
        &self,
        book: &BookRecord,
        progress: Option<ProgressCallback>,
    ) -> Result<ExportResult> {
        let output_dir = self.book_output_dir(book);
        FileManager::reset_dir(&output_dir)?;
        let archive_path = self.archive_path(book);
        FileManager::remove_path(&archive_path)?;

        let groups = self.load_groups(book.id).await?;
        if groups.is_empty() {
            warn!("Book {} has no chapters with paragraphs", book.id);
            return Ok(ExportResult::failure(output_dir, "no chapters to export"));
        }
        info!("Exporting book {} as {} segment(s)", book.id, groups.len());

        let total = groups.len();
        let mut segments = Vec::with_capacity(total);
        for (i, group) in groups.iter().enumerate() {
            let segment = self.export_group(book, group, &output_dir).await;
            if let Some(callback) = &progress {
                callback(i + 1, total);
            }
            segments.push(segment);
        }

        let success_count = segments.iter().filter(|s| s.success).count();
        let fail_count = total - success_count;
        let success = success_count > 0;

        let archive = if success && self.config.create_archive {
            self.build_archive(&output_dir, &archive_path).await
        } else {
            None
        };

        let message = if success {
            format!(
                "Exported {}/{} segment(s) to {}",
                success_count,
                total,
                output_dir.display()
            )
        } else {
            format!("All {} segment(s) failed to export", total)
        };

        Ok(ExportResult {
            success,
            message,
            output_dir,
            total_segments: total,
            success_count,
            fail_count,
            segments,
            archive,
        })
    }

    async fn load_groups(&self, book_id: i64) -> Result<Vec<ExportGroup>> {
        let chapters = self
            .store
            .book_chapters(book_id)
            .await
            .with_context(|| format!("Failed to load chapters of book {}", book_id))?;

        let mut contents = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let paragraphs = self.store.chapter_paragraphs(chapter.id).await?;
            contents.push(ChapterContent { chapter, paragraphs });
        }

        let min_ms = self.config.min_group_ms() as i64;
        let target_ms = self.config.target_group_ms() as i64;
        let groups = group_chapters(contents, min_ms);
        for group in groups.iter().filter(|g| g.duration_ms > target_ms) {
            debug!(
                "Segment {} runs {} ms, above the {} ms target",
                group.folder_name(),
                group.duration_ms,
                target_ms
            );
        }
        Ok(groups)
    }

    async fn export_group(&self, book: &BookRecord, group: &ExportGroup, output_dir: &Path) -> SegmentResult {
        let folder = group.folder_name();
        let folder_path = output_dir.join(&folder);
        let caption_path = folder_path.join(format!("{}.lrc", folder));
        let audio_path = folder_path.join(format!("{}.{}", folder, self.config.format.extension()));

        let mut result = SegmentResult {
            folder: folder.clone(),
            chapter_indices: group.chapter_indices.clone(),
            duration_ms: group.duration_ms,
            audio_path: None,
            caption_path: None,
            success: false,
            error: None,
        };

        let lrc = caption::generate(&group.paragraphs, &book.title, &book.author);
        if let Err(e) = FileManager::write_to_file(&caption_path, &lrc) {
            error!("Segment {}: {:#}", folder, e);
            result.error = Some(format!("{:#}", e));
            FileManager::remove_dir_if_empty(&folder_path);
            return result;
        }

        let inputs: Vec<PathBuf> = group
            .paragraphs
            .iter()
            .filter_map(|p| p.audio_path.as_deref())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect();
        let without_audio = group.paragraphs.len() - inputs.len();
        if without_audio > 0 {
            warn!("Segment {}: {} paragraph(s) have no audio", folder, without_audio);
        }

        match self.merger.merge_report(&inputs, &audio_path).await {
            Ok(report) => {
                info!(
                    "Segment {}: merged {} file(s), skipped {}",
                    folder, report.used, report.skipped
                );
                result.audio_path = Some(audio_path);
                result.caption_path = Some(caption_path);
                result.success = true;
            }
            Err(e) => {
                error!("Segment {} failed: {}", folder, e);
                if let Err(remove_err) = FileManager::remove_path(&caption_path) {
                    warn!("Could not remove caption {:?}: {:#}", caption_path, remove_err);
                }
                FileManager::remove_dir_if_empty(&folder_path);
                result.error = Some(e.to_string());
            }
        }

        result
    }

    async fn build_archive(&self, output_dir: &Path, archive_path: &Path) -> Option<PathBuf> {
        let source = output_dir.to_path_buf();
        let target = archive_path.to_path_buf();
        let created = tokio::task::spawn_blocking(move || {
            FileManager::create_zip_archive(&source, &target).map(|count| (target, count))
        })
        .await;

        match created {
            Ok(Ok((path, count))) => {
                info!("Archived {} file(s) into {:?}", count, path);
                Some(path)
            }
            Ok(Err(e)) => {
                warn!("Archive creation failed: {:#}", e);
                None
            }
            Err(e) => {
                warn!("Archive task failed: {}", e);
                None
            }
        }
    }

    /// Remove every file produced for a book: paragraph audio, export tree and archive
    pub fn cleanup_book_files(&self, book: &BookRecord) -> usize {
        let targets = [
            self.audio_dir.join(format!("book_{}", book.id)),
            self.book_output_dir(book),
            self.archive_path(book),
        ];

        let mut removed = 0;
        for target in &targets {
            match FileManager::remove_path(target) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Cleanup of {:?} failed: {:#}", target, e),
            }
        }
        removed
    }
}
