//! Bucket and file content protocol.
//!
//! Downloads carrying `X-Directory: expand` are a gzip-compressed tar
//! expanded under the destination; anything else is a single file.
//! Uploads are `multipart/form-data` produced on the blocking pool and
//! streamed as the request body.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::io::AsyncWriteExt;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::debug;

use crate::api;
use crate::client::{Client, X_DIRECTORY, is_dir};
use crate::error::{Error, Result};
use crate::multipart::{self, Field, MultipartWriter};
use crate::pipe::{self, Sink};
use crate::sender::{HttpSend, chain};

impl<S: HttpSend> Client<S> {
    /// Download bucket content at `source` into `destination`.
    pub async fn bucket_get(&self, source: &str, destination: &Path) -> Result<()> {
        let response = self
            .send(|| self.request(Method::GET, source, &[], api::MIME_OCTET_STREAM))
            .await?;
        let response = self.check(&Method::GET, response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        if expands(response.headers()) {
            get_dir(response, destination).await
        } else {
            get_file(response, source, destination).await
        }
    }

    /// Upload the file or directory at `source` to bucket path `destination`.
    pub async fn bucket_put(&self, source: &Path, destination: &str) -> Result<()> {
        let dir = is_dir(source, true)?;
        let response = self
            .send(|| {
                let boundary = multipart::boundary();
                let mut request =
                    self.request(Method::PUT, destination, &[], api::MIME_OCTET_STREAM)?;
                let headers = request.headers_mut();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(&multipart::content_type(&boundary))?,
                );
                if dir {
                    headers.insert(X_DIRECTORY, HeaderValue::from_static(api::DIRECTORY_EXPAND));
                }
                let source = source.to_path_buf();
                *request.body_mut() = Some(pipe::body(move |sink| {
                    put_content(sink, boundary, &source, dir)
                }));
                Ok(request)
            })
            .await?;
        self.check(&Method::PUT, response).await.map(drop)
    }

    /// Download a single file; 204 writes nothing.
    pub async fn file_get(&self, path: &str, destination: &Path) -> Result<()> {
        let response = self
            .send(|| self.request(Method::GET, path, &[], api::MIME_OCTET_STREAM))
            .await?;
        let response = self.check(&Method::GET, response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        get_file(response, path, destination).await
    }

    /// Upload `source` (or an empty part when `None`) and decode the response.
    pub async fn file_post<T>(&self, path: &str, source: Option<&Path>, out: &mut T) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        self.file_post_encoded(path, source, out, None).await
    }

    pub async fn file_post_encoded<T>(
        &self,
        path: &str,
        source: Option<&Path>,
        out: &mut T,
        encoding: Option<&str>,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        let field = file_field(source, encoding)?;
        self.file_send(path, Method::POST, vec![field], out).await
    }

    pub async fn file_put<T>(&self, path: &str, source: Option<&Path>, out: &mut T) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        self.file_put_encoded(path, source, out, None).await
    }

    pub async fn file_put_encoded<T>(
        &self,
        path: &str,
        source: Option<&Path>,
        out: &mut T,
        encoding: Option<&str>,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        let field = file_field(source, encoding)?;
        self.file_send(path, Method::PUT, vec![field], out).await
    }

    /// Append `content` to the file at `path`.
    pub async fn file_patch(&self, path: &str, content: impl Into<Bytes>) -> Result<()> {
        let field = Field::content(api::FILE_FIELD, content);
        self.file_send(path, Method::PATCH, vec![field], &mut IgnoredAny)
            .await
    }

    /// Send `fields` as a streamed multipart body and decode the response.
    pub async fn file_send<T>(
        &self,
        path: &str,
        method: Method,
        fields: Vec<Field>,
        out: &mut T,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        let response = self
            .send(|| {
                let boundary = multipart::boundary();
                let mut request = self.request(method.clone(), path, &[], api::MIME_JSON)?;
                request.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(&multipart::content_type(&boundary))?,
                );
                let fields = fields.clone();
                *request.body_mut() = Some(pipe::body(move |sink| {
                    send_fields(sink, boundary, &fields)
                }));
                Ok(request)
            })
            .await?;
        self.decode(&method, response, out).await
    }
}

fn expands(headers: &HeaderMap) -> bool {
    headers
        .get(X_DIRECTORY)
        .is_some_and(|v| v.as_bytes() == api::DIRECTORY_EXPAND.as_bytes())
}

fn file_field(source: Option<&Path>, encoding: Option<&str>) -> Result<Field> {
    let field = match source {
        Some(path) => {
            if is_dir(path, true)? {
                return Err(Error::NotRegularFile {
                    path: path.to_path_buf(),
                });
            }
            Field::file(api::FILE_FIELD, path)
        }
        None => Field::content(api::FILE_FIELD, Bytes::new()),
    };
    Ok(match encoding {
        Some(mime) => field.encoding(mime),
        None => field,
    })
}

fn put_content(sink: &mut Sink, boundary: String, source: &Path, dir: bool) -> Result<()> {
    let field = Field::file(api::FILE_FIELD, source);
    let mut mp = MultipartWriter::new(sink, boundary);
    let part = mp
        .create_part(&field.disposition(), api::MIME_OCTET_STREAM)
        .map_err(|e| Error::io(source, e))?;
    if dir {
        let mut archive = hub_archive::Writer::new(part);
        archive.add_dir(source)?;
        archive.finish()?;
    } else {
        field.write_to(part)?;
    }
    mp.finish().map_err(|e| Error::io(source, e))?;
    Ok(())
}

fn send_fields(sink: &mut Sink, boundary: String, fields: &[Field]) -> Result<()> {
    let mut mp = MultipartWriter::new(sink, boundary);
    for field in fields {
        let part = mp
            .create_part(&field.disposition(), field.mime())
            .map_err(|e| Error::io(&field.name, e))?;
        field.write_to(part)?;
    }
    mp.finish().map_err(|e| Error::Request(format!("multipart: {e}")))?;
    Ok(())
}

async fn get_dir(response: Response, destination: &Path) -> Result<()> {
    let stream = response.bytes_stream().map_err(io::Error::other);
    let reader = SyncIoBridge::new(StreamReader::new(Box::pin(stream)));
    let target = destination.to_path_buf();
    let report = tokio::task::spawn_blocking(move || hub_archive::extract(reader, &target)).await??;
    debug!(
        "expanded {} files, {} directories ({} bytes) into {}",
        report.files,
        report.directories,
        report.total_bytes,
        destination.display()
    );
    Ok(())
}

async fn get_file(response: Response, source: &str, destination: &Path) -> Result<()> {
    let target = if is_dir(destination, false)? {
        destination.join(basename(source))
    } else {
        destination.to_path_buf()
    };
    let mut file = tokio::fs::File::create(&target)
        .await
        .map_err(|e| Error::io(&target, e))?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| Error::Request(chain(&e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io(&target, e))?;
    }
    file.flush().await.map_err(|e| Error::io(&target, e))?;
    Ok(())
}

fn basename(path: &str) -> PathBuf {
    let trimmed = path.trim_end_matches('/');
    PathBuf::from(trimmed.rsplit('/').next().unwrap_or(trimmed))
}
