//! `multipart/form-data` request bodies.

use bytes::{BufMut, Bytes, BytesMut};
use mime::Mime;

#[derive(Debug, Clone)]
struct Part {
    name: String,
    file: Option<(String, Mime)>,
    data: Bytes,
}

/// A buffered multipart form.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Empty form with a random boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(format!("pastq-{}", uuid::Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.to_owned(),
            file: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: Mime, data: Bytes) -> Self {
        self.parts.push(Part {
            name: name.to_owned(),
            file: Some((file_name.to_owned(), content_type)),
            data,
        });
        self
    }

    /// Value for the `Content-Type` request header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Serialize the form.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        let payload: usize = self.parts.iter().map(|p| p.data.len() + 128).sum();
        let mut buf = BytesMut::with_capacity(payload + self.boundary.len() + 8);

        for part in self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");
            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(escape(&part.name).as_bytes());
            buf.put_slice(b"\"");
            if let Some((file_name, content_type)) = &part.file {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(escape(file_name).as_bytes());
                buf.put_slice(b"\"\r\nContent-Type: ");
                buf.put_slice(content_type.as_ref().as_bytes());
            }
            buf.put_slice(b"\r\n\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        buf.freeze()
    }
}

fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
