//! Per-score on-disk storage
//!
//! Layout under the storage root:
//!
//! ```text
//! scores/<id>/<millis>-<slug>.<ext>   uploaded image
//! scores/<id>/<stem>.musicxml         OCR output
//! scores/<id>/<stem>.mid              conversion output
//! ```
//!
//! The database stores paths relative to the root with `/` separators so
//! they can be appended to the `/files` URL prefix as-is.

use std::io;
use std::path::{Path, PathBuf};

/// Subdirectory holding one directory per score
const SCORES_DIR: &str = "scores";

/// Extension used when neither the bytes nor the file name tell us anything
const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute directory of one score
    pub fn score_dir(&self, score_id: i64) -> PathBuf {
        self.root.join(SCORES_DIR).join(score_id.to_string())
    }

    /// Storage-relative path of a file inside a score directory
    pub fn relative_path(&self, score_id: i64, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            SCORES_DIR,
            score_id,
            file_name.replace('\\', "/")
        )
    }

    /// Resolve a storage-relative path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub async fn ensure_score_dir(&self, score_id: i64) -> io::Result<PathBuf> {
        let dir = self.score_dir(score_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove a score directory and everything in it; missing is fine
    pub async fn remove_score_dir(&self, score_id: i64) -> io::Result<()> {
        match tokio::fs::remove_dir_all(self.score_dir(score_id)).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Lowercase the name and collapse every run of characters outside
/// `[a-z0-9]` into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_gap = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }

    slug
}

/// `<millis>-<slug>.<ext>`, with `score` standing in for an empty slug
pub fn upload_file_name(timestamp_millis: i64, name: &str, extension: &str) -> String {
    let slug = slugify(name);
    let slug = if slug.is_empty() { "score" } else { slug.as_str() };
    format!("{}-{}.{}", timestamp_millis, slug, extension)
}

/// Pick the stored file extension: sniffed from the bytes, else taken from
/// the uploaded file name, else `png`.
pub fn detect_extension(bytes: &[u8], original_name: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.extension().to_string();
    }

    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Test"), "test");
        assert_eq!(slugify("Für Elise, Op. 59"), "f-r-elise-op-59");
        assert_eq!(slugify("  spaced  out  "), "-spaced-out-");
        assert_eq!(slugify("!!!"), "-");
    }

    #[test]
    fn test_upload_file_name_falls_back_to_score() {
        assert_eq!(upload_file_name(1700, "Moonlight", "png"), "1700-moonlight.png");
        assert_eq!(upload_file_name(1700, "", "jpg"), "1700-score.jpg");
    }

    #[test]
    fn test_detect_extension_prefers_bytes() {
        assert_eq!(detect_extension(PNG_MAGIC, Some("photo.jpeg")), "png");
        assert_eq!(detect_extension(b"plain", Some("photo.JPEG")), "jpeg");
        assert_eq!(detect_extension(b"plain", Some("noext")), "png");
        assert_eq!(detect_extension(b"plain", None), "png");
    }

    #[test]
    fn test_relative_and_absolute_paths() {
        let storage = Storage::new("/srv/storage");
        let rel = storage.relative_path(7, "a.musicxml");
        assert_eq!(rel, "scores/7/a.musicxml");
        assert_eq!(
            storage.absolute(&rel),
            PathBuf::from("/srv/storage").join("scores").join("7").join("a.musicxml")
        );
        assert_eq!(storage.absolute(&rel).parent().unwrap(), storage.score_dir(7));
    }

    #[tokio::test]
    async fn test_ensure_and_remove_score_dir() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path());

        let dir = storage.ensure_score_dir(3).await.unwrap();
        tokio::fs::write(dir.join("partial.musicxml"), b"<score/>").await.unwrap();
        assert!(dir.is_dir());

        storage.remove_score_dir(3).await.unwrap();
        assert!(!dir.exists());

        // Removing again is not an error
        storage.remove_score_dir(3).await.unwrap();
    }
}
