// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use bookcast::app_config::{self, Config, SpeechProviderKind};
use bookcast::audio::AudioFormat;
use bookcast::Controller;

/// CLI Wrapper for SpeechProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSpeechProvider {
    OpenAI,
    Mock,
}

impl From<CliSpeechProvider> for SpeechProviderKind {
    fn from(cli_provider: CliSpeechProvider) -> Self {
        match cli_provider {
            CliSpeechProvider::OpenAI => SpeechProviderKind::OpenAI,
            CliSpeechProvider::Mock => SpeechProviderKind::Mock,
        }
    }
}

/// CLI Wrapper for AudioFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliAudioFormat {
    Mp3,
    Wav,
    Flac,
    M4a,
    Ogg,
    Opus,
}

impl From<CliAudioFormat> for AudioFormat {
    fn from(cli_format: CliAudioFormat) -> Self {
        match cli_format {
            CliAudioFormat::Mp3 => AudioFormat::Mp3,
            CliAudioFormat::Wav => AudioFormat::Wav,
            CliAudioFormat::Flac => AudioFormat::Flac,
            CliAudioFormat::M4a => AudioFormat::M4a,
            CliAudioFormat::Ogg => AudioFormat::Ogg,
            CliAudioFormat::Opus => AudioFormat::Opus,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a .txt/.md book, or every book below a directory
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List imported books with their synthesis progress
    Books,

    /// Synthesize every unfinished paragraph of a book
    Synthesize {
        #[arg(value_name = "BOOK_ID")]
        book_id: i64,
    },

    /// Export audio segments, captions and archive of a book
    Export {
        #[arg(value_name = "BOOK_ID")]
        book_id: i64,
    },

    /// Import, synthesize and export a book file in one go
    Run {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List the voices of the selected speech provider
    Voices,

    /// Delete a book together with its audio and exports
    Delete {
        #[arg(value_name = "BOOK_ID")]
        book_id: i64,
    },

    /// Generate shell completions for bookcast
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// bookcast - turn books into audiobooks with LRC captions
#[derive(Parser, Debug)]
#[command(name = "bookcast")]
#[command(version)]
#[command(about = "Audiobook synthesis and export tool")]
#[command(long_about = "bookcast imports plain text or Markdown books, synthesizes speech per paragraph and exports chapter-grouped audio segments with LRC captions.

EXAMPLES:
    bookcast import novel.txt                  # Import a book
    bookcast books                             # List books and progress
    bookcast -j 8 synthesize 1                 # Synthesize book 1 with 8 workers
    bookcast -f wav export 1                   # Export book 1 as WAV segments
    bookcast -p mock run novel.md              # Dry run the whole pipeline offline
    bookcast completions bash > bookcast.bash  # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    openai - OpenAI-compatible speech API (requires API key)
    mock   - Offline silent audio, for testing the pipeline")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Speech provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliSpeechProvider>,

    /// Voice id
    #[arg(short, long, global = true)]
    voice: Option<String>,

    /// Maximum concurrent synthesis requests
    #[arg(short = 'j', long, global = true)]
    concurrency: Option<usize>,

    /// Output audio format
    #[arg(short, long, value_enum, global = true)]
    format: Option<CliAudioFormat>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

impl CommandLineOptions {
    /// Apply command line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(provider) = &self.provider {
            config.synthesis.provider = provider.clone().into();
        }
        if let Some(voice) = &self.voice {
            config.synthesis.voice = voice.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.synthesis.max_concurrent = concurrency;
        }
        if let Some(format) = &self.format {
            config.export.format = format.clone().into();
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone().into();
        }
    }

    fn needs_speech_backend(&self) -> bool {
        matches!(self.command, Commands::Synthesize { .. } | Commands::Run { .. })
    }
}

// @struct: Custom logger writing timestamped, coloured lines to stderr
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for a log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept everything here; the effective level is set after the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "bookcast", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config)?;
    cli.apply_overrides(&mut config);
    log::set_max_level(config.log_level.to_level_filter());

    if cli.needs_speech_backend() {
        config.validate().context("Configuration validation failed")?;
    }

    let controller = Controller::with_config(config)?;
    run_command(&controller, cli.command).await
}

async fn run_command(controller: &Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Import { path } => {
            for summary in controller.import(&path).await? {
                let note = if summary.already_imported { " (already imported)" } else { "" };
                println!(
                    "{:>4}  {}  {} chapter(s), {} paragraph(s){}",
                    summary.book_id, summary.title, summary.chapters, summary.paragraphs, note
                );
            }
        }
        Commands::Books => {
            let books = controller.list_books().await?;
            if books.is_empty() {
                info!("No books imported yet");
            }
            for (book, counts) in books {
                println!(
                    "{:>4}  {}  {}  {} min  {}",
                    book.id,
                    book.title,
                    if book.author.is_empty() { "-" } else { book.author.as_str() },
                    book.estimated_duration_ms / 60_000,
                    counts
                );
            }
        }
        Commands::Synthesize { book_id } => {
            let report = controller.synthesize(book_id).await?;
            println!(
                "{}/{} paragraph(s) synthesized ({:.1}%)",
                report.completed, report.total, report.progress
            );
        }
        Commands::Export { book_id } => {
            let result = controller.export(book_id).await?;
            print_export(&result);
            if !result.success {
                anyhow::bail!("Export failed: {}", result.message);
            }
        }
        Commands::Run { path } => {
            let summary = controller.run(&path).await?;
            println!(
                "Book {}: {}/{} paragraph(s) synthesized",
                summary.import.book_id, summary.synthesis.completed, summary.synthesis.total
            );
            print_export(&summary.export);
            if !summary.export.success {
                anyhow::bail!("Export failed: {}", summary.export.message);
            }
        }
        Commands::Voices => {
            for voice in controller.voices(None)? {
                println!("{:<12} {:<28} {:<14} {}", voice.id, voice.key, voice.locale, voice.gender);
            }
        }
        Commands::Delete { book_id } => {
            if controller.delete_book(book_id).await? {
                info!("Deleted book {}", book_id);
            } else {
                warn!("Book {} was not deleted", book_id);
            }
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

fn print_export(result: &bookcast::ExportResult) {
    for segment in &result.segments {
        if segment.success {
            println!("  ok      {}  ({} s)", segment.folder, segment.duration_ms / 1000);
        } else {
            error!(
                "Segment {} failed: {}",
                segment.folder,
                segment.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("{}", result.message);
    if let Some(archive) = &result.archive {
        println!("Archive: {}", archive.display());
    }
}
