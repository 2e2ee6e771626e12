/*!
 * Tests for book decoding and import
 */

use anyhow::Result;
use bookcast::database::{ParagraphStore, Repository};
use bookcast::decoder::{self, BookDecoder, TextDecoder};
use bookcast::errors::DecodeError;

use crate::common;

/// Test that a UTF-16 book decodes the same as its UTF-8 twin
#[test]
fn test_textDecoder_withUtf16File_shouldDecodeChapters() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let text = "第一章 起\n\n天亮了。\n\n第二章 承\n\n又黑了。\n";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let path = temp_dir.path().join("utf16.txt");
    std::fs::write(&path, bytes)?;

    let decoder = TextDecoder::open(&path)?;
    let chapters = decoder.chapters().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(decoder.chapter_count(), 2);
    assert_eq!(chapters[0].title, "第一章 起");
    assert_eq!(chapters[1].paragraphs, vec!["又黑了。"]);
    Ok(())
}

/// Test that a GBK-encoded Chinese book imports with its chapters intact
#[tokio::test]
async fn test_importFile_withGbkTextFile_shouldStoreChapters() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let text = "第一章 启程\n\n船在黎明出发。\n\n第二章 归来\n\n终于靠岸了！\n";
    let (bytes, _, unmappable) = encoding_rs::GBK.encode(text);
    assert!(!unmappable);
    assert!(std::str::from_utf8(&bytes).is_err());
    let path = temp_dir.path().join("航海.txt");
    std::fs::write(&path, &bytes)?;
    let repo = Repository::new_in_memory()?;

    let summary = decoder::import_file(&repo, &path).await?;

    assert_eq!(summary.chapters, 2);
    let chapters = repo.book_chapters(summary.book_id).await?;
    let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["第一章 启程", "第二章 归来"]);
    let paragraphs = repo.book_paragraphs(summary.book_id).await?;
    let contents: Vec<&str> = paragraphs.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["船在黎明出发。", "终于靠岸了！"]);
    Ok(())
}

/// Test that binary content is rejected with an encoding error
#[test]
fn test_textDecoder_withBinaryFile_shouldFailWithEncodingError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("blob.txt");
    std::fs::write(&path, [0xC0u8, 0xFF, 0x00, 0x81])?;

    assert!(matches!(TextDecoder::open(&path), Err(DecodeError::Encoding(_))));
    Ok(())
}

/// Test that import lays out a continuous estimated timeline across chapters
#[tokio::test]
async fn test_importFile_withMarkdownBook_shouldStoreContinuousTimeline() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "guide.md",
        "Intro words here.\n\n# Part A\n\nAlpha paragraph.\n\n## Part B\n\nBeta paragraph.\n\nGamma paragraph.\n",
    )?;
    let repo = Repository::new_in_memory()?;

    let summary = decoder::import_file(&repo, &path).await?;

    assert_eq!(summary.title, "guide");
    assert_eq!(summary.chapters, 3);
    let chapters = repo.book_chapters(summary.book_id).await?;
    let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Preface", "Part A", "Part B"]);

    let paragraphs = repo.book_paragraphs(summary.book_id).await?;
    assert_eq!(paragraphs.len(), 4);
    assert!(paragraphs.windows(2).all(|w| w[0].end_time_ms == w[1].start_time_ms));
    let book = repo.get_book(summary.book_id).await?.unwrap();
    assert_eq!(book.estimated_duration_ms, paragraphs[3].end_time_ms);
    Ok(())
}

/// Test that unsupported files are refused before anything is stored
#[tokio::test]
async fn test_importFile_withUnsupportedExtension_shouldStoreNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "book.epub", "PK")?;
    let repo = Repository::new_in_memory()?;

    assert!(decoder::import_file(&repo, &path).await.is_err());
    assert!(repo.list_books().await?.is_empty());
    Ok(())
}
