use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::database::{BookRecord, Repository, StatusCounts};
use crate::decoder::{self, ImportSummary, SUPPORTED_EXTENSIONS};
use crate::export::{ExportOrchestrator, ExportResult};
use crate::file_utils::FileManager;
use crate::providers::{ProviderRegistry, SpeechProvider, VoiceInfo};
use crate::synthesis::{ProgressCallback, SynthesisDriver, SynthesisReport, WorkerPool};

// @module: Application controller for audiobook production

/// Result of the full import, synthesize and export pipeline for one file
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub import: ImportSummary,
    pub synthesis: SynthesisReport,
    pub export: ExportResult,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    repository: Arc<Repository>,
    // Import, listing and export work without a usable speech backend
    registry: std::result::Result<ProviderRegistry, String>,
}

impl Controller {
    // @method: Create a controller backed by the configured database
    pub fn with_config(config: Config) -> Result<Self> {
        let db_path = config.resolved_database_path()?;
        let repository = Repository::open(&db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;
        Self::with_repository(config, repository)
    }

    /// Create a controller over an existing repository
    pub fn with_repository(config: Config, repository: Repository) -> Result<Self> {
        let registry = ProviderRegistry::from_config(&config.synthesis).map_err(|e| format!("{:#}", e));
        if let Err(e) = &registry {
            debug!("Speech synthesis unavailable: {}", e);
        }
        Ok(Self {
            config,
            repository: Arc::new(repository),
            registry,
        })
    }

    /// Create a controller from prebuilt parts, used when backends are assembled by hand
    pub fn with_parts(config: Config, repository: Repository, registry: ProviderRegistry) -> Self {
        Self {
            config,
            repository: Arc::new(repository),
            registry: Ok(registry),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    fn registry(&self) -> Result<&ProviderRegistry> {
        self.registry.as_ref().map_err(|e| anyhow!("{}", e))
    }

    fn provider(&self) -> Result<Arc<dyn SpeechProvider>> {
        self.registry()?.get(None)
    }

    fn exporter(&self) -> ExportOrchestrator {
        ExportOrchestrator::new(
            self.repository.clone(),
            self.config.export.clone(),
            &self.config.output_dir,
            &self.config.audio_dir,
        )
    }

    async fn book(&self, book_id: i64) -> Result<BookRecord> {
        self.repository
            .get_book(book_id)
            .await?
            .ok_or_else(|| anyhow!("Book {} not found", book_id))
    }

    fn progress_bar(multi_progress: &MultiProgress, len: u64, unit: &str) -> ProgressBar {
        let progress_bar = multi_progress.add(ProgressBar::new(len));
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
            unit
        );
        let style = ProgressStyle::default_bar()
            .template(&template)
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar
    }

    /// Import one book file, or every supported file below a directory
    pub async fn import(&self, path: &Path) -> Result<Vec<ImportSummary>> {
        if !path.exists() {
            return Err(anyhow!("Input path does not exist: {:?}", path));
        }
        if path.is_file() {
            return Ok(vec![decoder::import_file(&self.repository, path).await?]);
        }

        let files = FileManager::find_files(path, &SUPPORTED_EXTENSIONS)?;
        if files.is_empty() {
            return Err(anyhow!("No book files found in directory: {:?}", path));
        }

        let pool = WorkerPool::new(self.config.synthesis.max_concurrent);
        let results = pool
            .run_all(files.clone(), |file| {
                let repository = self.repository.clone();
                async move { decoder::import_file(&repository, &file).await }
            })
            .await;

        let mut imported = Vec::new();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(summary) => imported.push(summary),
                // One unreadable book must not stop the others
                Err(e) => error!("Import of {:?} failed: {:#}", file, e),
            }
        }
        info!("Imported {}/{} file(s) from {:?}", imported.len(), files.len(), path);
        Ok(imported)
    }

    pub async fn list_books(&self) -> Result<Vec<(BookRecord, StatusCounts)>> {
        let mut books = Vec::new();
        for book in self.repository.list_books().await? {
            let counts = self.repository.status_counts(book.id).await?;
            books.push((book, counts));
        }
        Ok(books)
    }

    /// Voices of the named backend, or of the default one
    pub fn voices(&self, provider: Option<&str>) -> Result<Vec<VoiceInfo>> {
        Ok(self.registry()?.get(provider)?.supported_voices())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.as_ref().map(|r| r.names()).unwrap_or_default()
    }

    /// Synthesize every unfinished paragraph of a book
    pub async fn synthesize(&self, book_id: i64) -> Result<SynthesisReport> {
        let book = self.book(book_id).await?;
        let provider = self.provider()?;
        let synthesis = &self.config.synthesis;
        info!(
            "Synthesizing '{}' with {} (voice {}, {} workers)",
            book.title,
            provider.name(),
            synthesis.voice,
            synthesis.max_concurrent
        );

        let multi_progress = MultiProgress::new();
        let progress_bar = Self::progress_bar(&multi_progress, book.total_paragraphs.max(0) as u64, "paragraphs");
        progress_bar.set_message("Synthesizing");
        let pb = progress_bar.clone();
        let callback: ProgressCallback = Arc::new(move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        });

        let start_time = Instant::now();
        let driver = SynthesisDriver::new(self.repository.clone(), provider, &self.config.audio_dir);
        let report = driver
            .synthesize_book(
                book_id,
                &synthesis.voice,
                synthesis.max_concurrent,
                synthesis.max_rounds as usize,
                Some(callback),
            )
            .await;
        progress_bar.finish_and_clear();
        let report = report?;

        if report.is_complete() {
            info!(
                "Synthesis of '{}' complete: {} paragraph(s) in {:.1}s",
                book.title,
                report.total,
                start_time.elapsed().as_secs_f64()
            );
        } else {
            warn!(
                "Synthesis of '{}' incomplete: {}/{} paragraph(s) ({:.1}%) after {} round(s)",
                book.title,
                report.completed,
                report.total,
                report.progress,
                report.rounds.len()
            );
        }
        Ok(report)
    }

    /// Export a book's audio segments and captions
    pub async fn export(&self, book_id: i64) -> Result<ExportResult> {
        let book = self.book(book_id).await?;

        let multi_progress = MultiProgress::new();
        let progress_bar = Self::progress_bar(&multi_progress, 0, "segments");
        progress_bar.set_message("Exporting");
        let pb = progress_bar.clone();
        let callback: ProgressCallback = Arc::new(move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        });

        let result = self.exporter().export_with_progress(&book, Some(callback)).await;
        progress_bar.finish_and_clear();
        let result = result?;

        if result.success {
            info!("{}", result.message);
        } else {
            error!("Export of '{}' failed: {}", book.title, result.message);
        }
        Ok(result)
    }

    /// Import, synthesize and export one file
    pub async fn run(&self, path: &Path) -> Result<RunSummary> {
        if !path.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", path));
        }

        let import = decoder::import_file(&self.repository, path).await?;
        let synthesis = self.synthesize(import.book_id).await?;
        let export = self.export(import.book_id).await?;

        Ok(RunSummary {
            import,
            synthesis,
            export,
        })
    }

    /// Delete a book with its audio and exports
    pub async fn delete_book(&self, book_id: i64) -> Result<bool> {
        let book = self.book(book_id).await?;
        let removed = self.exporter().cleanup_book_files(&book);
        info!("Removed {} file location(s) of book {}", removed, book_id);
        self.repository.delete_book(book_id).await
    }

    /// Where a book's export lands
    pub async fn output_dir_for(&self, book_id: i64) -> Result<PathBuf> {
        let book = self.book(book_id).await?;
        Ok(self.exporter().book_output_dir(&book))
    }
}
