//! Client image resolution.
//!
//! An image source is either a local path or a URL; URL sources are
//! downloaded to a temporary file first. A declared format of `auto`
//! resolves in three passes: filename extension, magic-byte header
//! (PNG, JPEG, GIF, WEBP, in that order), then a textual check for an
//! SVG root element. If all three passes fail the image is rejected.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ArgumentError, ImageError, KanidmError, KanidmResult};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG.
    Png,
    /// JPEG.
    Jpg,
    /// GIF.
    Gif,
    /// SVG.
    Svg,
    /// WEBP.
    Webp,
    /// Infer the format from the source (default).
    #[default]
    Auto,
}

impl ImageFormat {
    /// MIME type for the format; `None` for [`ImageFormat::Auto`].
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::Svg => Some("image/svg+xml"),
            Self::Webp => Some("image/webp"),
            Self::Auto => None,
        }
    }

    /// Filename extension; empty for [`ImageFormat::Auto`].
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::Webp => "webp",
            Self::Auto => "",
        }
    }

    fn from_mime(essence: &str) -> Option<Self> {
        match essence {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpg),
            "image/gif" => Some(Self::Gif),
            "image/svg+xml" => Some(Self::Svg),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = KanidmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "gif" => Ok(Self::Gif),
            "svg" => Ok(Self::Svg),
            "webp" => Ok(Self::Webp),
            "auto" => Ok(Self::Auto),
            other => Err(ArgumentError::InvalidImageFormat {
                format: other.to_string(),
            }
            .into()),
        }
    }
}

/// Image configuration on an OAuth2 client spec.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Local path or URL of the image.
    pub src: String,
    /// Declared format.
    pub format: ImageFormat,
}

impl ImageSpec {
    /// Create an image spec with automatic format inference.
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            format: ImageFormat::Auto,
        }
    }

    /// Create an image spec with an explicit format.
    pub fn with_format(src: impl Into<String>, format: ImageFormat) -> Self {
        Self {
            src: src.into(),
            format,
        }
    }

    /// Resolve the spec to uploadable bytes and a concrete format.
    ///
    /// URL sources are fetched through the given transport and written to
    /// a temporary file that lives as long as the returned value.
    pub async fn resolve(&self, transport: &dyn HttpTransport) -> KanidmResult<ResolvedImage> {
        let mut format = self.format;

        if format == ImageFormat::Auto {
            if let Some(guessed) = mime_guess::from_path(&self.src)
                .first()
                .and_then(|m| ImageFormat::from_mime(m.essence_str()))
            {
                format = guessed;
            }
        }

        let is_remote = self.src.starts_with("http://")
            || self.src.starts_with("https://")
            || self.src.starts_with("ftp://");

        let (bytes, path, temp) = if is_remote {
            let bytes = self.download(transport).await?;
            let mut file = NamedTempFile::new().map_err(|e| ImageError::Io {
                src: self.src.clone(),
                message: e.to_string(),
            })?;
            file.write_all(&bytes).map_err(|e| ImageError::Io {
                src: self.src.clone(),
                message: e.to_string(),
            })?;
            (bytes, file.path().to_path_buf(), Some(file))
        } else {
            let bytes = std::fs::read(&self.src).map_err(|e| ImageError::Io {
                src: self.src.clone(),
                message: e.to_string(),
            })?;
            (Bytes::from(bytes), PathBuf::from(&self.src), None)
        };

        if format == ImageFormat::Auto {
            format = sniff_format(&bytes).unwrap_or(ImageFormat::Auto);
        }
        if format == ImageFormat::Auto {
            return Err(ImageError::UnknownFormat {
                src: self.src.clone(),
            }
            .into());
        }

        debug!(src = %self.src, format = format.extension(), "resolved image");
        Ok(ResolvedImage {
            format,
            bytes,
            path,
            _temp: temp,
        })
    }

    async fn download(&self, transport: &dyn HttpTransport) -> KanidmResult<Bytes> {
        let response = transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: self.src.clone(),
                headers: Default::default(),
                body: None,
            })
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(ImageError::Download {
                src: self.src.clone(),
                detail: format!("HTTP {} {}", response.status, response.reason),
            }
            .into());
        }
        Ok(response.body)
    }
}

/// An image resolved to bytes with a concrete format.
#[derive(Debug)]
pub struct ResolvedImage {
    /// The resolved format, never [`ImageFormat::Auto`].
    pub format: ImageFormat,
    /// Raw image bytes.
    pub bytes: Bytes,
    /// Local path of the image data.
    pub path: PathBuf,
    // Keeps a downloaded file alive for the lifetime of the value.
    _temp: Option<NamedTempFile>,
}

/// Identify a format from the file's magic-byte header.
fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&PNG_MAGIC) {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(&JPEG_MAGIC) {
        return Some(ImageFormat::Jpg);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }
    if looks_like_svg(bytes) {
        return Some(ImageFormat::Svg);
    }
    None
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    text.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("<svg") || line.starts_with("<?xml") || line.starts_with("<!DOCTYPE svg")
    })
}
