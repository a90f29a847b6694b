//! Copies the lines of one downloaded page into a shared output.

use std::fs::File;
use std::io::{BufRead as _, BufReader, Write};
use std::path::Path;

use crate::DownloadError;

/// Appends the lines of `batch_source_file_path` to `target_writer`.
///
/// When `include_header_row` is `false`, the first line of the page is
/// skipped. Line terminators are copied as-is, and a final line without one
/// is terminated with `\n` so the next page starts on its own line. The
/// target writer is borrowed and left open.
///
/// Returns `false` if the page cannot be read or the target cannot be
/// written. Lines are only ever written whole.
pub fn write_batch_results<W: Write + ?Sized>(
    target_writer: &mut W,
    batch_source_file_path: &Path,
    include_header_row: bool,
) -> bool {
    match copy_lines(target_writer, batch_source_file_path, include_header_row) {
        Ok(copied) => {
            log::debug!(
                "Copied {copied} lines from batch file {}",
                batch_source_file_path.display()
            );
            true
        }
        Err(e) => {
            log::warn!(
                "Exception while copying batch file {}: {e}",
                batch_source_file_path.display()
            );
            false
        }
    }
}

fn copy_lines<W: Write + ?Sized>(
    target_writer: &mut W,
    batch_source_file_path: &Path,
    include_header_row: bool,
) -> Result<u64, DownloadError> {
    let file = File::open(batch_source_file_path).map_err(DownloadError::io(batch_source_file_path))?;
    let mut reader = BufReader::new(file);

    let mut line = Vec::new();
    let mut line_index: u64 = 0;
    let mut copied: u64 = 0;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(DownloadError::io(batch_source_file_path))?;
        if read == 0 {
            break;
        }

        if include_header_row || line_index > 0 {
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }
            target_writer.write_all(&line).map_err(|source| DownloadError::Io {
                path: "<batch output>".to_string(),
                source,
            })?;
            copied += 1;
        }

        line_index += 1;
    }

    Ok(copied)
}

/// Counts the lines of a file the same way [`write_batch_results`] splits
/// them, including a final line without a terminator.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the file cannot be read.
pub fn count_lines(path: &Path) -> Result<u64, DownloadError> {
    let file = File::open(path).map_err(DownloadError::io(path))?;
    let mut reader = BufReader::new(file);

    let mut line = Vec::new();
    let mut lines: u64 = 0;

    loop {
        line.clear();
        if reader
            .read_until(b'\n', &mut line)
            .map_err(DownloadError::io(path))?
            == 0
        {
            break;
        }
        lines += 1;
    }

    Ok(lines)
}
