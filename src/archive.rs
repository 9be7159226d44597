// src/archive.rs
// =============================================================================
// Packs one job's working tree into a single deflate zip.
//
// The archive is best-effort and size-bounded, not guaranteed-complete: any
// file that would push the running uncompressed total past the cap is
// skipped, never an error. Zero qualifying files is the distinct
// "archive empty" failure — the snapshot was hollow.
// =============================================================================

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SnapshotError;

/// What ended up in the archive.
#[derive(Debug)]
pub struct ArchiveSummary {
    /// Files written into the archive.
    pub files: usize,
    /// Size of the finished archive file on disk.
    pub archive_bytes: u64,
    /// True when at least one file was skipped for the size cap.
    pub truncated: bool,
}

/// Walks `root` and writes every file into a zip at `destination`, each
/// under its path relative to `root`. Files are visited in sorted order so
/// the same tree always packs the same way.
pub fn pack_directory(
    root: &Path,
    destination: &Path,
    max_total_bytes: u64,
) -> Result<ArchiveSummary, SnapshotError> {
    let mut files = collect_files(root)?;
    files.sort();

    let file = File::create(destination)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0usize;
    let mut total: u64 = 0;
    let mut truncated = false;

    for path in files {
        let bytes = std::fs::read(&path)?;
        if total + bytes.len() as u64 > max_total_bytes {
            truncated = true;
            debug!(file = %path.display(), "skipped for archive size cap");
            continue;
        }
        let name = relative_name(root, &path);
        writer.start_file(name, options)?;
        writer.write_all(&bytes)?;
        total += bytes.len() as u64;
        written += 1;
    }

    writer.finish()?;

    if written == 0 {
        // Hollow snapshot: remove the empty shell so nothing is served.
        let _ = std::fs::remove_file(destination);
        return Err(SnapshotError::ArchiveEmpty);
    }

    if truncated {
        warn!(archive = %destination.display(), "archive truncated at the size cap");
    }

    let archive_bytes = std::fs::metadata(destination)?.len();
    Ok(ArchiveSummary {
        files: written,
        archive_bytes,
        truncated,
    })
}

/// Best-effort removal of a working tree; already-gone is fine.
pub fn remove_tree_quiet(root: &Path) {
    if let Err(e) = std::fs::remove_dir_all(root) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %root.display(), error = %e, "could not remove working tree");
        }
    }
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    // Zip entry names always use forward slashes.
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_file(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let zip = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn packs_the_tree_under_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("job");
        write_file(&tree, "index.html", b"<html></html>");
        write_file(&tree, "css/style.css", b"body{}");
        write_file(&tree, "images/pics/dot.png", &[1, 2, 3]);
        let archive = dir.path().join("out.zip");

        let summary = pack_directory(&tree, &archive, 1024 * 1024).unwrap();
        assert_eq!(summary.files, 3);
        assert!(!summary.truncated);
        assert_eq!(
            entry_names(&archive),
            vec!["css/style.css", "images/pics/dot.png", "index.html"]
        );
    }

    #[test]
    fn archive_contents_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("job");
        write_file(&tree, "index.html", b"<html>hi</html>");
        let archive = dir.path().join("out.zip");

        pack_directory(&tree, &archive, 1024).unwrap();
        let file = File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut entry = zip.by_name("index.html").unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "<html>hi</html>");
    }

    #[test]
    fn oversize_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("job");
        write_file(&tree, "a-small.txt", b"ok");
        write_file(&tree, "z-huge.bin", &vec![0u8; 4096]);
        let archive = dir.path().join("out.zip");

        // Cap admits the small file but not the huge one.
        let summary = pack_directory(&tree, &archive, 100).unwrap();
        assert_eq!(summary.files, 1);
        assert!(summary.truncated);
        assert_eq!(entry_names(&archive), vec!["a-small.txt"]);
    }

    #[test]
    fn zero_qualifying_files_is_archive_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("job");
        std::fs::create_dir_all(&tree).unwrap();
        let archive = dir.path().join("out.zip");

        let err = pack_directory(&tree, &archive, 1024).unwrap_err();
        assert!(matches!(err, SnapshotError::ArchiveEmpty));
        assert!(!archive.exists());
    }

    #[test]
    fn remove_tree_quiet_tolerates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-existed");
        remove_tree_quiet(&gone); // must not panic
        remove_tree_quiet(&gone); // nor on the second attempt
    }
}
