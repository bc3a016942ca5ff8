//! Directory packaging

use std::io::{Cursor, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{CompileError, Result};

/// Zip every file under `dir` into an in-memory archive.
///
/// Entries are sorted and carry a fixed timestamp, so an unchanged
/// directory always produces the same bytes.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let archive_error = |message: String| CompileError::Archive {
        path: dir.to_path_buf(),
        message,
    };

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| archive_error(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| archive_error(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(mode(entry.path()));
        writer
            .start_file(name, options)
            .map_err(|e| archive_error(e.to_string()))?;
        let content =
            std::fs::read(entry.path()).map_err(|e| CompileError::read(entry.path(), e))?;
        writer
            .write_all(&content)
            .map_err(|e| archive_error(e.to_string()))?;
    }

    let cursor = writer.finish().map_err(|e| archive_error(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(unix)]
fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn mode(_path: &Path) -> u32 {
    0o644
}
