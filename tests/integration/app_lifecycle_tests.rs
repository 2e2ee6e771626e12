/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use bookcast::app_controller::Controller;
use bookcast::database::TtsStatus;

use crate::common;

/// Test the controller initialization against an on-disk database
#[test]
fn test_controller_withConfig_shouldCreateDatabaseFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::mock_config(temp_dir.path());
    let db_path = config.resolved_database_path()?;

    let controller = Controller::with_config(config)?;
    let books = tokio_test::block_on(controller.list_books())?;

    assert!(db_path.exists());
    assert!(books.is_empty());
    assert_eq!(controller.provider_names(), vec!["mock".to_string()]);
    Ok(())
}

/// Test the full import, synthesize and export pipeline on a Markdown book
#[tokio::test]
async fn test_run_withMarkdownBook_shouldExportSegmentAndArchive() -> Result<()> {
    common::init_test_logger();
    let temp_dir = common::create_temp_dir()?;
    let book_path = common::create_test_file(
        temp_dir.path(),
        "books/voyage.md",
        "# Departure\n\nThe ship left at dawn. Nobody waved.\n\n# Arrival\n\nLand at last!\n",
    )?;
    let controller = Controller::with_config(common::mock_config(temp_dir.path()))?;

    let summary = controller.run(&book_path).await?;

    assert_eq!(summary.import.chapters, 2);
    assert!(summary.synthesis.is_complete());
    assert!(summary.export.success);
    assert_eq!(summary.export.segments.len(), 1);
    let segment = &summary.export.segments[0];
    assert_eq!(segment.folder, "chapters1-2");
    let lrc = std::fs::read_to_string(segment.caption_path.as_ref().unwrap())?;
    assert!(lrc.starts_with("[ti:voyage]\n[00:00.00]The ship left at dawn.\n"));
    assert!(lrc.contains("Land at last!"));
    assert_eq!(
        summary.export.archive,
        Some(temp_dir.path().join("output").join("voyage.zip"))
    );
    assert_eq!(controller.output_dir_for(summary.import.book_id).await?, summary.export.output_dir);
    Ok(())
}

/// Test that reopening the same database resumes an existing book
#[tokio::test]
async fn test_controller_reopened_shouldSeeImportedBooks() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let book_path = common::create_test_file(temp_dir.path(), "note.txt", "Short note.\n\nSecond thought.")?;

    let first = Controller::with_config(common::mock_config(temp_dir.path()))?;
    let imported = first.import(&book_path).await?;
    drop(first);

    let second = Controller::with_config(common::mock_config(temp_dir.path()))?;
    let again = second.import(&book_path).await?;
    let books = second.list_books().await?;

    assert_eq!(books.len(), 1);
    assert!(again[0].already_imported);
    assert_eq!(again[0].book_id, imported[0].book_id);
    assert_eq!(books[0].1.pending, 2);
    Ok(())
}

/// Test that a book with a rejected paragraph still exports what it has
#[tokio::test]
async fn test_synthesizeThenExport_withPartialFailure_shouldExportAvailableAudio() -> Result<()> {
    use bookcast::database::{ParagraphStore, Repository};
    use bookcast::providers::{MockSpeechProvider, ProviderRegistry};
    use std::sync::Arc;

    let temp_dir = common::create_temp_dir()?;
    let book_path = common::create_test_file(temp_dir.path(), "mixed.txt", "Readable text.\n\nUNSPEAKABLE text.")?;
    let mut registry = ProviderRegistry::new("mock");
    registry.register(Arc::new(MockSpeechProvider::new().failing_on("UNSPEAKABLE")));
    let controller = Controller::with_parts(
        common::mock_config(temp_dir.path()),
        Repository::new_in_memory()?,
        registry,
    );
    let book_id = controller.import(&book_path).await?[0].book_id;

    let report = controller.synthesize(book_id).await?;
    let result = controller.export(book_id).await?;

    assert_eq!(report.completed, 1);
    assert_eq!(report.total, 2);
    assert_eq!(report.rounds.len(), 3);
    let statuses: Vec<TtsStatus> = controller
        .repository()
        .book_paragraphs(book_id)
        .await?
        .into_iter()
        .map(|p| p.tts_status)
        .collect();
    assert_eq!(statuses, vec![TtsStatus::Completed, TtsStatus::Failed]);
    assert!(result.success);
    Ok(())
}
