use crate::error::{ArchiveError, Error};
use crate::extraction::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing multiple files
fn create_zip_archive_multi(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Entry names of a ZIP archive
fn entry_names(archive_path: &Path) -> BTreeSet<String> {
    let file = std::fs::File::open(archive_path).unwrap();
    let archive = ::zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn write_sources(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extract_preserves_folders_by_default() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("meta.zip");
    create_zip_archive_multi(
        &archive,
        &[("catalog.csv", b"id\n"), ("aicc/a1.au", b"au")],
    );
    let dest = temp.path().join("out");

    let report = extract_archive(&archive, &dest, &ExtractOptions::default())
        .await
        .unwrap();

    assert_eq!(report.destination, dest);
    assert_eq!(report.extracted.len(), 2);
    assert!(dest.join("catalog.csv").is_file());
    assert_eq!(std::fs::read(dest.join("aicc").join("a1.au")).unwrap(), b"au");
}

#[tokio::test]
async fn test_extract_flattens_when_paths_not_preserved() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("meta.zip");
    create_zip_archive_multi(&archive, &[("deep/nested/a1.crs", b"crs")]);
    let dest = temp.path().join("out");

    let options = ExtractOptions::default().preserve_paths(false);
    extract_archive(&archive, &dest, &options).await.unwrap();

    assert!(dest.join("a1.crs").is_file());
    assert!(!dest.join("deep").exists());
}

#[tokio::test]
async fn test_extract_into_subdirectory_named_after_archive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("aimetadata_AICC.zip");
    create_zip_archive_multi(&archive, &[("a1.des", b"des")]);

    let options = ExtractOptions::default().into_subdirectory(true);
    let report = extract_archive(&archive, temp.path(), &options)
        .await
        .unwrap();

    let expected = temp.path().join("aimetadata_AICC");
    assert_eq!(report.destination, expected);
    assert!(expected.join("a1.des").is_file());
}

#[tokio::test]
async fn test_extract_keeps_existing_files_without_overwrite() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("meta.zip");
    create_zip_archive_multi(&archive, &[("a1.ort", b"new"), ("a2.ort", b"new")]);
    let dest = temp.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("a1.ort"), b"old").unwrap();

    let options = ExtractOptions::default().overwrite(false);
    let report = extract_archive(&archive, &dest, &options).await.unwrap();

    assert_eq!(report.skipped, vec![dest.join("a1.ort")]);
    assert_eq!(report.extracted, vec![dest.join("a2.ort")]);
    assert_eq!(std::fs::read(dest.join("a1.ort")).unwrap(), b"old");
}

#[tokio::test]
async fn test_extract_overwrites_by_default() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("meta.zip");
    create_zip_archive_multi(&archive, &[("a1.ort", b"new")]);
    let dest = temp.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("a1.ort"), b"old").unwrap();

    extract_archive(&archive, &dest, &ExtractOptions::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read(dest.join("a1.ort")).unwrap(), b"new");
}

#[tokio::test]
async fn test_extract_corrupt_archive_is_archive_error() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.zip");
    std::fs::write(&archive, b"this is not a zip file").unwrap();

    let err = extract_archive(&archive, &temp.path().join("out"), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Archive(ArchiveError::Corrupt { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_extract_missing_archive_is_archive_error() {
    let temp = TempDir::new().unwrap();
    let err = extract_archive(
        &temp.path().join("absent.zip"),
        &temp.path().join("out"),
        &ExtractOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Archive(ArchiveError::Corrupt { .. })));
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_build_skips_one_missing_source_of_five() {
    let temp = TempDir::new().unwrap();
    let mut sources = write_sources(temp.path(), &["a1.au", "a1.crs", "a1.cst", "a1.des"]);
    let missing = temp.path().join("a1.ort");
    sources.push(missing.clone());
    let output = temp.path().join("bundles").join("0000_assets.zip");

    let report = build_archive(&output, sources).await.unwrap();

    assert_eq!(report.archive, output);
    assert_eq!(report.added.len(), 4);
    assert_eq!(report.skipped, vec![missing]);
    assert_eq!(
        entry_names(&output),
        ["a1.au", "a1.crs", "a1.cst", "a1.des"]
            .into_iter()
            .map(str::to_string)
            .collect()
    );
}

#[tokio::test]
async fn test_build_skips_directories_and_duplicate_names() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("one");
    let second = temp.path().join("two");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    let a = write_sources(&first, &["thumb.png"]);
    let b = write_sources(&second, &["thumb.png"]);
    let output = temp.path().join("out.zip");

    let sources = vec![a[0].clone(), b[0].clone(), first.clone()];
    let report = build_archive(&output, sources).await.unwrap();

    assert_eq!(report.added, vec![a[0].clone()]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(entry_names(&output).len(), 1);
}

#[tokio::test]
async fn test_build_with_no_sources_writes_empty_archive() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("empty.zip");
    let report = build_archive(&output, Vec::new()).await.unwrap();
    assert!(report.added.is_empty());
    assert!(entry_names(&output).is_empty());
}

#[tokio::test]
async fn test_build_unwritable_destination_is_archive_error() {
    let temp = TempDir::new().unwrap();
    // A regular file where the parent directory should be
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let err = build_archive(&blocker.join("out.zip"), Vec::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Archive(ArchiveError::WriteFailed { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_built_archive_extracts_back() {
    let temp = TempDir::new().unwrap();
    let sources = write_sources(temp.path(), &["x.au", "x.crs"]);
    let output = temp.path().join("bundle.zip");
    build_archive(&output, sources).await.unwrap();

    let dest = temp.path().join("unpacked");
    let report = extract_archive(&output, &dest, &ExtractOptions::default())
        .await
        .unwrap();
    assert_eq!(report.extracted.len(), 2);
    assert_eq!(std::fs::read(dest.join("x.crs")).unwrap(), b"x.crs");
}
