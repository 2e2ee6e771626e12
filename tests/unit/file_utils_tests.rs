/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use bookcast::file_utils::FileManager;
use std::fs;

use crate::common;

/// Test that file_exists distinguishes files from missing paths
#[test]
fn test_fileExists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "exists.txt", "content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.txt")));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test that ensure_dir creates nested directories
#[test]
fn test_ensureDir_withNestedPath_shouldCreateAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b").join("c");

    FileManager::ensure_dir(&nested)?;

    assert!(FileManager::dir_exists(&nested));
    Ok(())
}

/// Test that remove_path handles files, trees and missing paths
#[test]
fn test_removePath_shouldReportWhetherSomethingWasRemoved() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_test_file(temp_dir.path(), "tree/inner/file.txt", "x")?;

    assert!(FileManager::remove_path(&file)?);
    assert!(FileManager::remove_path(temp_dir.path().join("tree"))?);
    assert!(!FileManager::remove_path(temp_dir.path().join("tree"))?);
    Ok(())
}

/// Test that sanitize_filename keeps non-ASCII titles readable
#[test]
fn test_sanitizeFilename_withUnicodeTitle_shouldOnlyReplaceForbidden() {
    assert_eq!(FileManager::sanitize_filename(" 三体: 第一部 "), "三体_ 第一部");
    assert_eq!(FileManager::sanitize_filename("a/b\\c|d"), "a_b_c_d");
}

/// Test that find_files returns only matching files in sorted order
#[test]
fn test_findFiles_withNestedBooks_shouldReturnSortedMatches() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "z.txt", "z")?;
    common::create_test_file(temp_dir.path(), "sub/a.MD", "a")?;
    common::create_test_file(temp_dir.path(), "cover.jpg", "")?;

    let found = FileManager::find_files(temp_dir.path(), &["txt", "md"])?;

    let names: Vec<String> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.MD", "z.txt"]);
    Ok(())
}

/// Test that an archive contains every file under the source directory
#[test]
fn test_createZipArchive_withSegmentFolders_shouldStoreAllFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = temp_dir.path().join("book");
    common::create_test_file(&source, "chapters1/chapters1.lrc", "[00:00.00]x\n")?;
    common::write_wav(&source.join("chapters1/chapters1.wav"), 50)?;
    let archive = temp_dir.path().join("book.zip");

    let stored = FileManager::create_zip_archive(&source, &archive)?;

    assert_eq!(stored, 2);
    let mut zip = zip::ZipArchive::new(fs::File::open(&archive)?)?;
    assert!(zip.by_name("chapters1/chapters1.lrc").is_ok());
    assert!(zip.by_name("chapters1/chapters1.wav").is_ok());
    Ok(())
}
