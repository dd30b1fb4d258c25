//! Fixture scaffolding utilities for integration tests.

use std::path::Path;

/// Copy the files of a fixture directory into `dst`. Fixtures are flat.
pub fn copy_fixture_files(src: &Path, dst: &Path) {
    let entries = std::fs::read_dir(src)
        .unwrap_or_else(|e| panic!("fixture dir {}: {e}", src.display()));
    for path in entries.map(|entry| entry.expect("fixture entry").path()) {
        if path.is_file() {
            let name = path.file_name().expect("fixture file name");
            std::fs::copy(&path, dst.join(name)).expect("Failed to copy fixture");
        }
    }
}

/// Write a single file under `root`, creating parent directories.
pub fn write_file(root: &Path, rel_path: &str, contents: &str) {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create dir");
    }
    std::fs::write(path, contents).expect("Failed to write file");
}
