//! `multipart/form-data` encoding over a blocking writer.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::api;
use crate::error::{Error, Result};

/// Upload form field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub source: Source,
    /// MIME override; inferred from the path extension when unset.
    pub encoding: Option<String>,
}

/// Part content.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Content(Bytes),
}

impl Field {
    /// Part streamed from a file.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: Source::Path(path.into()),
            encoding: None,
        }
    }

    /// Part from memory.
    pub fn content(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: Source::Content(content.into()),
            encoding: None,
        }
    }

    pub fn encoding(mut self, mime: impl Into<String>) -> Self {
        self.encoding = Some(mime.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(p) => Some(p),
            Source::Content(_) => None,
        }
    }

    /// Part MIME type.
    pub fn mime(&self) -> &str {
        if let Some(mime) = &self.encoding {
            return mime;
        }
        let ext = self.path().and_then(Path::extension).and_then(|e| e.to_str());
        match ext {
            Some("json") => api::MIME_JSON,
            Some("yaml") => api::MIME_YAML,
            _ => api::MIME_OCTET_STREAM,
        }
    }

    pub fn disposition(&self) -> String {
        let filename = self
            .path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        format!(
            r#"form-data; name="{}"; filename="{}""#,
            quote(&self.name),
            quote(&filename)
        )
    }

    /// Copy the content into `w`.
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        match &self.source {
            Source::Path(path) => {
                let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
                io::copy(&mut file, w).map_err(|e| Error::io(path, e))?;
            }
            Source::Content(bytes) => {
                w.write_all(bytes).map_err(|e| Error::io(&self.name, e))?;
            }
        }
        Ok(())
    }
}

/// Escape `\` and `"` for a quoted-string; line breaks are dropped.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '\r' | '\n' => {}
            c => out.push(c),
        }
    }
    out
}

/// Writes parts separated by a random boundary.
pub(crate) struct MultipartWriter<W: Write> {
    inner: W,
    boundary: String,
    parts: usize,
}

impl<W: Write> MultipartWriter<W> {
    pub(crate) fn new(inner: W, boundary: String) -> Self {
        Self {
            inner,
            boundary,
            parts: 0,
        }
    }

    /// Start a part; its body is written through the returned writer.
    pub(crate) fn create_part(&mut self, disposition: &str, mime: &str) -> io::Result<&mut W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(
            self.inner,
            "--{}\r\nContent-Disposition: {disposition}\r\nContent-Type: {mime}\r\n\r\n",
            self.boundary
        )?;
        self.parts += 1;
        Ok(&mut self.inner)
    }

    /// Write the closing boundary and return the sink.
    pub(crate) fn finish(mut self) -> io::Result<W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(self.inner, "--{}--\r\n", self.boundary)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Fresh random boundary.
pub(crate) fn boundary() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}
