//! Manual multipart/form-data assembly.
//!
//! The transport layer is byte-oriented, so multipart bodies are built by
//! hand rather than delegated to the HTTP client. Used for the OAuth2
//! client image upload.

use bytes::Bytes;

/// Multipart form builder producing a content-type header and body bytes.
pub struct MultipartForm {
    boundary: String,
    parts: Vec<MultipartPart>,
}

struct MultipartPart {
    name: String,
    filename: Option<String>,
    content_type: String,
    data: Bytes,
}

impl MultipartForm {
    /// Create a new form with a unique boundary.
    pub fn new() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let boundary = format!("----KanidmBoundary{timestamp}");

        Self {
            boundary,
            parts: Vec::new(),
        }
    }

    /// Add a file field to the form.
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: Bytes) -> Self {
        self.parts.push(MultipartPart {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    /// Build the form, returning the content-type header value and body.
    pub fn build(self) -> (String, Bytes) {
        let mut body = Vec::new();

        for part in &self.parts {
            body.extend_from_slice(b"--");
            body.extend_from_slice(self.boundary.as_bytes());
            body.extend_from_slice(b"\r\n");

            body.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            body.extend_from_slice(part.name.as_bytes());
            body.extend_from_slice(b"\"");
            if let Some(filename) = &part.filename {
                body.extend_from_slice(b"; filename=\"");
                body.extend_from_slice(filename.as_bytes());
                body.extend_from_slice(b"\"");
            }
            body.extend_from_slice(b"\r\n");

            body.extend_from_slice(b"Content-Type: ");
            body.extend_from_slice(part.content_type.as_bytes());
            body.extend_from_slice(b"\r\n\r\n");

            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(b"--");
        body.extend_from_slice(self.boundary.as_bytes());
        body.extend_from_slice(b"--\r\n");

        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        (content_type, Bytes::from(body))
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_part() {
        let (content_type, body) =
            MultipartForm::new()
                .file("image", "app.png", "image/png", Bytes::from_static(b"\x89PNG"))
                .build();

        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("Content-Disposition: form-data; name=\"image\"; filename=\"app.png\""));
        assert!(text.contains("Content-Type: image/png"));
        assert!(text.ends_with("--\r\n"));
    }
}
