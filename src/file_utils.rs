use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

// @module: File and directory utilities

/// Characters that may not appear in a generated file or folder name
const FORBIDDEN_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @resets: Delete a directory with its contents and recreate it empty
    pub fn reset_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_dir_all(path)
                .with_context(|| format!("Failed to clear directory: {:?}", path))?;
        }
        Self::ensure_dir(path)
    }

    /// Remove a file or a directory tree; missing paths are not an error
    pub fn remove_path<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path = path.as_ref();
        if path.is_dir() {
            fs::remove_dir_all(path).with_context(|| format!("Failed to remove {:?}", path))?;
            Ok(true)
        } else if path.exists() {
            fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove `path` if it is an empty directory
    pub fn remove_dir_if_empty<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let empty = fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        empty && fs::remove_dir(path).is_ok()
    }

    /// Replace characters that are invalid in file names with `_` and trim
    pub fn sanitize_filename(name: &str) -> String {
        name.chars()
            .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Find files with one of `extensions` below a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy();
                    if extensions.iter().any(|e| ext.eq_ignore_ascii_case(e.trim_start_matches('.'))) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Zip the contents of `source_dir` into `archive_path`.
    ///
    /// Entry names are relative to `source_dir` with `/` separators. An
    /// existing archive is replaced. Returns the number of files stored.
    pub fn create_zip_archive<P1: AsRef<Path>, P2: AsRef<Path>>(
        source_dir: P1,
        archive_path: P2,
    ) -> Result<usize> {
        let source_dir = source_dir.as_ref();
        let archive_path = archive_path.as_ref();

        if let Some(parent) = archive_path.parent() {
            Self::ensure_dir(parent)?;
        }
        if archive_path.exists() {
            fs::remove_file(archive_path)
                .with_context(|| format!("Failed to replace archive: {:?}", archive_path))?;
        }

        let file = fs::File::create(archive_path)
            .with_context(|| format!("Failed to create archive: {:?}", archive_path))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut stored = 0;
        let mut entries: Vec<PathBuf> = WalkDir::new(source_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    warn!("Skipping unreadable entry while archiving: {}", e);
                    None
                }
            })
            .collect();
        entries.sort();

        for path in entries {
            let relative = path
                .strip_prefix(source_dir)
                .with_context(|| format!("Entry outside archive root: {:?}", path))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            if path.is_dir() {
                writer.add_directory(format!("{}/", name), options)?;
                continue;
            }

            writer.start_file(name.clone(), options)?;
            let bytes = fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
            writer.write_all(&bytes)?;
            stored += 1;
            debug!("Archived {}", name);
        }

        writer.finish().context("Failed to finalize archive")?;
        Ok(stored)
    }
}
