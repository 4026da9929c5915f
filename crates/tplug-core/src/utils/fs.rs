use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// List the regular files directly inside `dir` that match a predicate.
///
/// Subdirectories are not descended into. The result is sorted by path.
pub fn list_files<P, F>(dir: P, predicate: &F) -> io::Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> bool + ?Sized,
{
    let mut result = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry_path = entry?.path();
        if entry_path.is_file() && predicate(&entry_path) {
            result.push(entry_path);
        }
    }

    result.sort();
    Ok(result)
}

/// List files directly inside `dir` whose extension matches, ignoring case
pub fn list_files_with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
    list_files(dir, &|p: &Path| has_extension(p, extension))
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Write a file, creating its parent directory first
pub fn write_file<P: AsRef<Path>>(path: P, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, contents)
}
