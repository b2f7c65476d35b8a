//! Image reference resolution.
//!
//! Markdown image targets come in four shapes: remote URLs, `data:` URIs,
//! absolute paths, and paths relative to the markdown file. URLs and data
//! URIs pass through untouched; filesystem paths are made absolute and
//! canonical so the same file always resolves to the same string.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Kind of image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// `http://` or `https://` URL.
    Url,
    /// `data:` URI with inline payload.
    DataUri,
    /// Rooted filesystem path (including `file://` URLs).
    Absolute,
    /// Path relative to the markdown file's directory.
    Relative,
}

/// Image format as far as it can be told without reading the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Svg,
    Webp,
    Tiff,
    Unknown,
}

impl ImageFormat {
    fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "svg" => Self::Svg,
            "webp" => Self::Webp,
            "tif" | "tiff" => Self::Tiff,
            _ => Self::Unknown,
        }
    }

    fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/bmp" => Self::Bmp,
            "image/svg+xml" => Self::Svg,
            "image/webp" => Self::Webp,
            "image/tiff" => Self::Tiff,
            _ => Self::Unknown,
        }
    }
}

/// Classify an image reference by prefix and rootedness.
#[must_use]
pub fn classify(reference: &str) -> ImageSource {
    let lower = reference.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        ImageSource::Url
    } else if lower.starts_with("data:") {
        ImageSource::DataUri
    } else if lower.starts_with("file://") || Path::new(reference).has_root() {
        ImageSource::Absolute
    } else {
        ImageSource::Relative
    }
}

/// Resolves image references against the markdown file's directory.
#[derive(Debug, Clone)]
pub struct ImagePathResolver {
    base_dir: PathBuf,
}

impl ImagePathResolver {
    /// Create a resolver for images referenced from `source_path`.
    ///
    /// Without a source path, relative references resolve against the
    /// current working directory.
    #[must_use]
    pub fn new(source_path: Option<&Path>) -> Self {
        let base_dir = source_path
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(
                || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
                Path::to_path_buf,
            );
        Self {
            base_dir: absolutize(&base_dir),
        }
    }

    /// Directory relative references resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a reference to its canonical form.
    ///
    /// URLs and data URIs are returned unchanged. Filesystem paths are
    /// returned as absolute, normalized path strings. Resolving a result
    /// again yields the same string.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> String {
        match self.resolve_path(reference) {
            Some(path) => path.to_string_lossy().into_owned(),
            None => reference.to_owned(),
        }
    }

    /// Resolve a filesystem reference to a path; `None` for URLs and data URIs.
    #[must_use]
    pub fn resolve_path(&self, reference: &str) -> Option<PathBuf> {
        let raw = match classify(reference) {
            ImageSource::Url | ImageSource::DataUri => return None,
            ImageSource::Absolute => strip_file_scheme(reference),
            ImageSource::Relative => reference,
        };

        let candidate = self.join(raw);
        if candidate.exists() {
            return Some(canonicalize(&candidate));
        }

        // `my%20image.png` usually means `my image.png` on disk.
        if let Ok(decoded) = percent_decode_str(raw).decode_utf8()
            && decoded != raw
        {
            let decoded = self.join(&decoded);
            if decoded.exists() {
                return Some(canonicalize(&decoded));
            }
        }

        Some(canonicalize(&candidate))
    }

    /// Whether the reference can be used: existence for filesystem paths,
    /// always true for URLs and data URIs.
    #[must_use]
    pub fn is_valid(&self, reference: &str) -> bool {
        self.resolve_path(reference).is_none_or(|path| path.is_file())
    }

    fn join(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Detect the image format from the extension or, for data URIs, the MIME type.
#[must_use]
pub fn detect_format(reference: &str) -> ImageFormat {
    if classify(reference) == ImageSource::DataUri {
        let mime = reference
            .get(5..)
            .and_then(|rest| rest.split([';', ',']).next())
            .unwrap_or("");
        return ImageFormat::from_mime(mime);
    }

    // Ignore query strings and fragments on URLs.
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(ImageFormat::Unknown, ImageFormat::from_extension)
}

fn strip_file_scheme(reference: &str) -> &str {
    let Some(prefix) = reference.get(..7) else {
        return reference;
    };
    if !prefix.eq_ignore_ascii_case("file://") {
        return reference;
    }
    let rest = &reference[7..];
    // file://localhost/path
    rest.strip_prefix("localhost").unwrap_or(rest)
}

/// Canonicalize through the filesystem when possible, lexically otherwise.
fn canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        canonicalize(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        canonicalize(&cwd.join(path))
    }
}

/// Remove `.` and resolve `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("https://example.com/a.png"), ImageSource::Url);
        assert_eq!(classify("HTTP://example.com/a.png"), ImageSource::Url);
        assert_eq!(classify("data:image/png;base64,AAAA"), ImageSource::DataUri);
        assert_eq!(classify("/tmp/a.png"), ImageSource::Absolute);
        assert_eq!(classify("file:///tmp/a.png"), ImageSource::Absolute);
        assert_eq!(classify("images/a.png"), ImageSource::Relative);
        assert_eq!(classify("../a.png"), ImageSource::Relative);
    }

    #[test]
    fn test_urls_and_data_uris_unchanged() {
        let resolver = ImagePathResolver::new(None);
        for reference in [
            "https://example.com/a b.png?x=1",
            "http://example.com/../a.png",
            "data:image/png;base64,iVBORw0KGgo=",
        ] {
            assert_eq!(resolver.resolve(reference), reference);
            assert!(resolver.is_valid(reference));
        }
    }

    #[test]
    fn test_relative_path_resolves_against_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/a.png"), b"png").unwrap();
        let source = dir.path().join("doc.md");

        let resolver = ImagePathResolver::new(Some(&source));
        let resolved = resolver.resolve("img/../img/./a.png");

        let expected = std::fs::canonicalize(dir.path().join("img/a.png")).unwrap();
        assert_eq!(resolved, expected.to_string_lossy());
        assert!(resolver.is_valid("img/a.png"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        let resolver = ImagePathResolver::new(Some(&dir.path().join("doc.md")));

        for reference in ["a.png", "missing/../b.png", "./nested/c.png"] {
            let once = resolver.resolve(reference);
            let twice = resolver.resolve(&once);
            assert_eq!(once, twice, "{reference}");
        }
    }

    #[test]
    fn test_missing_path_is_normalized_lexically() {
        let resolver = ImagePathResolver::new(Some(Path::new("/nonexistent/docs/doc.md")));
        assert_eq!(
            resolver.resolve("../img/./x.png"),
            "/nonexistent/img/x.png"
        );
        assert!(!resolver.is_valid("../img/x.png"));
    }

    #[test]
    fn test_percent_encoded_reference_decoded_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my image.png"), b"png").unwrap();
        let resolver = ImagePathResolver::new(Some(&dir.path().join("doc.md")));

        let resolved = resolver.resolve("my%20image.png");
        assert!(resolved.ends_with("my image.png"));
        assert!(resolver.is_valid("my%20image.png"));
    }

    #[test]
    fn test_file_url_treated_as_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();
        let resolver = ImagePathResolver::new(None);

        let reference = format!("file://{}", file.display());
        let expected = std::fs::canonicalize(&file).unwrap();
        assert_eq!(resolver.resolve(&reference), expected.to_string_lossy());
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("a.PNG"), ImageFormat::Png);
        assert_eq!(detect_format("photo.jpg"), ImageFormat::Jpeg);
        assert_eq!(detect_format("https://x.io/chart.svg?v=2"), ImageFormat::Svg);
        assert_eq!(detect_format("scan.tif"), ImageFormat::Tiff);
        assert_eq!(detect_format("data:image/webp;base64,AAAA"), ImageFormat::Webp);
        assert_eq!(detect_format("data:image/svg+xml,<svg/>"), ImageFormat::Svg);
        assert_eq!(detect_format("data:text/plain,hi"), ImageFormat::Unknown);
        assert_eq!(detect_format("README"), ImageFormat::Unknown);
        assert_eq!(detect_format("archive.zip"), ImageFormat::Unknown);
    }
}
