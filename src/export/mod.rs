/*!
 * Export stage: chapter grouping, captions, audio merge and packaging.
 */

pub mod grouping;
pub mod orchestrator;

pub use grouping::{group_chapters, ChapterContent, ExportGroup};
pub use orchestrator::{ExportOrchestrator, ExportResult, SegmentResult};
