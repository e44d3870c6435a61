//! Custom assertions over written archives

use std::collections::BTreeSet;
use std::path::Path;

/// Entry names of the archive at `path`
pub fn zip_entries(path: &Path) -> BTreeSet<String> {
    let file = std::fs::File::open(path)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()));
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Assert the archive holds exactly `expected`
pub fn assert_zip_entries(path: &Path, expected: &[String]) {
    let expected: BTreeSet<String> = expected.iter().cloned().collect();
    assert_eq!(
        zip_entries(path),
        expected,
        "unexpected entries in {}",
        path.display()
    );
}
