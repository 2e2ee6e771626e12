/*!
 * # bookcast
 *
 * Turns decoded book text into a finished audiobook.
 *
 * ## Features
 *
 * - Import `.txt` and `.md` books into a SQLite library
 * - Synthesize speech per paragraph with bounded concurrency and retries:
 *   - OpenAI-compatible speech API
 *   - Offline mock backend for dry runs
 * - Group chapters into segments of at least 25 minutes
 * - Write LRC captions with sentence or word timing
 * - Merge paragraph audio into one file per segment and zip the result
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `database`: SQLite persistence and the `ParagraphStore` trait
 * - `decoder`: Book decoders and import
 * - `providers`: Speech backends, retry policy and registry
 * - `synthesis`: Worker pool, batch synthesizer and round driver
 * - `caption`: LRC generation
 * - `audio`: Decoding, probing and merging
 * - `export`: Chapter grouping and per-book export
 * - `text_utils`: Sentence splitting and speech text cleaning
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod caption;
pub mod database;
pub mod decoder;
pub mod errors;
pub mod export;
pub mod file_utils;
pub mod providers;
pub mod synthesis;
pub mod text_utils;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use audio::{AudioFormat, AudioMerger};
pub use database::{ParagraphStore, Repository};
pub use errors::{AppError, DecodeError, MergeError, ProviderError, SynthesisError};
pub use export::{ExportOrchestrator, ExportResult};
pub use providers::{ProviderRegistry, SpeechProvider};
pub use synthesis::{BatchOutcome, BatchSynthesizer, SynthesisDriver};
