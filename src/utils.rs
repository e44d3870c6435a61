//! Path and naming helpers

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Lowercased file extension of the last path segment of `url`
///
/// Query strings and fragments are ignored. Returns `None` when the last
/// segment has no extension.
///
/// # Examples
///
/// ```
/// use asset_bundler::utils::url_extension;
///
/// assert_eq!(url_extension("https://cdn.example.com/img/Logo.PNG?v=2"), Some("png".to_string()));
/// assert_eq!(url_extension("https://cdn.example.com/img/logo"), None);
/// ```
pub fn url_extension(url: &str) -> Option<String> {
    let last_segment = match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))?,
        // Relative or malformed URLs: strip query/fragment by hand
        Err(_) => {
            let path = url.trim().split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        }
    };

    Path::new(&last_segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
}

/// Content-addressed file name for a remote resource
///
/// The name is the hex SHA-256 of the trimmed, lowercased URL followed by the
/// URL's extension, so repeated runs map the same URL to the same file.
pub fn hashed_file_name(url: &str) -> String {
    let normalized = url.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    match url_extension(url) {
        Some(ext) => format!("{:x}.{}", digest, ext),
        None => format!("{:x}", digest),
    }
}

/// Create a directory and its parents; an existing directory is not an error
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// True if `path` is a regular file with at least one byte
pub async fn is_non_empty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_extension_ignores_query_and_case() {
        assert_eq!(
            url_extension("https://cdn.example.com/a/b/Thumb.JPG?size=large#x"),
            Some("jpg".to_string())
        );
        assert_eq!(url_extension("https://cdn.example.com/a/b/"), None);
        assert_eq!(url_extension("images/photo.gif?x=1"), Some("gif".to_string()));
    }

    #[test]
    fn test_hashed_file_name_is_normalized() {
        let a = hashed_file_name("https://cdn.example.com/img/one.png");
        let b = hashed_file_name("  HTTPS://CDN.EXAMPLE.COM/IMG/ONE.PNG ");
        assert_eq!(a, b);
        assert!(a.ends_with(".png"));
        // 64 hex chars + ".png"
        assert_eq!(a.len(), 68);
    }

    #[test]
    fn test_hashed_file_name_differs_per_url() {
        assert_ne!(
            hashed_file_name("https://cdn.example.com/img/one.png"),
            hashed_file_name("https://cdn.example.com/img/two.png")
        );
    }

    #[test]
    fn test_hashed_file_name_without_extension() {
        let name = hashed_file_name("https://cdn.example.com/thumbnail");
        assert_eq!(name.len(), 64);
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("a").join("b");
        ensure_dir(&dir).await.unwrap();
        ensure_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_is_non_empty_file() {
        let temp = tempfile::tempdir().unwrap();
        let empty = temp.path().join("empty");
        let full = temp.path().join("full");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"x").unwrap();

        assert!(!is_non_empty_file(&empty).await);
        assert!(is_non_empty_file(&full).await);
        assert!(!is_non_empty_file(&temp.path().join("missing")).await);
        assert!(!is_non_empty_file(temp.path()).await);
    }
}
