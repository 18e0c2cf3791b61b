use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{self, HeaderName, HeaderValue};
use reqwest::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::api;
use crate::error::{Error, NetworkError, RestError, Result};
use crate::options::ClientOptions;
use crate::path::{self, Param};
use crate::sender::{HttpSend, ReqwestSender, chain};

pub(crate) const X_DIRECTORY: HeaderName = HeaderName::from_static("x-directory");

/// Credentials exchanged with the auth routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Login {
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub token: String,
    pub refresh: String,
    pub expiry: i64,
}

/// Hub REST client.
///
/// Every operation funnels through one send loop that signs the request,
/// retries transient failures and translates statuses into [`Error`].
/// After the retry budget for a network failure is spent the client is
/// latched: every call returns that failure without sending until
/// [`Client::reset`] is called.
pub struct Client<S = ReqwestSender> {
    base: Url,
    sender: S,
    login: RwLock<Login>,
    retry: u32,
    retry_delay: Duration,
    strict_body: bool,
    error: Mutex<Option<NetworkError>>,
}

impl Client<ReqwestSender> {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let sender = ReqwestSender::new(options.pool.clone());
        Self::with_sender(options, sender)
    }
}

impl<S: HttpSend> Client<S> {
    pub fn with_sender(options: ClientOptions, sender: S) -> Result<Self> {
        let base = Url::parse(&options.base_url).map_err(|source| Error::Url {
            url: options.base_url.clone(),
            source,
        })?;
        Ok(Self {
            base,
            sender,
            login: RwLock::new(Login {
                token: options.token,
                refresh: options.refresh.unwrap_or_default(),
                ..Login::default()
            }),
            retry: options.retry,
            retry_delay: options.retry_delay,
            strict_body: options.strict_body,
            error: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn login(&self) -> Login {
        self.login.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.login.write().unwrap_or_else(PoisonError::into_inner).token = token.into();
    }

    pub fn set_refresh(&self, refresh: impl Into<String>) {
        self.login.write().unwrap_or_else(PoisonError::into_inner).refresh = refresh.into();
    }

    pub fn set_retry(&mut self, retry: u32, delay: Duration) {
        self.retry = retry;
        self.retry_delay = delay;
    }

    /// Latched network failure, if any.
    pub fn error(&self) -> Option<NetworkError> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clear the latched failure; the next call sends again.
    pub fn reset(&self) {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn latch(&self, err: &NetworkError) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.clone());
    }

    /// GET `path` and decode the response into `out`.
    pub async fn get<T>(&self, path: &str, out: &mut T, params: &[Param]) -> Result<()>
    where
        T: DeserializeOwned + Send,
    {
        let response = self
            .send(|| self.request(Method::GET, path, params, api::MIME_JSON))
            .await?;
        self.decode(&Method::GET, response, out).await
    }

    /// POST `in_out` and decode the response back into it.
    pub async fn post<T>(&self, path: &str, in_out: &mut T) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let body = Bytes::from(serde_json::to_vec(in_out)?);
        let response = self
            .send(|| self.json_request(Method::POST, path, &[], &body))
            .await?;
        self.decode(&Method::POST, response, in_out).await
    }

    pub async fn put<T>(&self, path: &str, in_out: &mut T, params: &[Param]) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let body = Bytes::from(serde_json::to_vec(in_out)?);
        let response = self
            .send(|| self.json_request(Method::PUT, path, params, &body))
            .await?;
        self.decode(&Method::PUT, response, in_out).await
    }

    pub async fn patch<T>(&self, path: &str, in_out: &mut T, params: &[Param]) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let body = Bytes::from(serde_json::to_vec(in_out)?);
        let response = self
            .send(|| self.json_request(Method::PATCH, path, params, &body))
            .await?;
        self.decode(&Method::PATCH, response, in_out).await
    }

    pub async fn delete(&self, path: &str, params: &[Param]) -> Result<()> {
        let response = self
            .send(|| self.request(Method::DELETE, path, params, api::MIME_JSON))
            .await?;
        self.check(&Method::DELETE, response).await.map(drop)
    }

    /// DELETE carrying a JSON body.
    pub async fn delete_with<B>(&self, path: &str, body: &B, params: &[Param]) -> Result<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        let body = Bytes::from(serde_json::to_vec(body)?);
        let response = self
            .send(|| self.json_request(Method::DELETE, path, params, &body))
            .await?;
        self.check(&Method::DELETE, response).await.map(drop)
    }

    /// Stat `path`; with `must == false` a missing path is `Ok(false)`.
    pub fn is_dir(&self, path: &Path, must: bool) -> Result<bool> {
        is_dir(path, must)
    }

    /// Resolve `path` against the base URL and append `params`.
    pub(crate) fn url(&self, path: &str, params: &[Param]) -> Url {
        let mut url = self.base.clone();
        url.set_path(&path::join(self.base.path(), path));
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for p in params {
                query.append_pair(&p.key, &p.value);
            }
        }
        url
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        params: &[Param],
        accept: &'static str,
    ) -> Result<Request> {
        let mut request = Request::new(method, self.url(path, params));
        request
            .headers_mut()
            .insert(header::ACCEPT, HeaderValue::from_static(accept));
        Ok(request)
    }

    fn json_request(&self, method: Method, path: &str, params: &[Param], body: &Bytes) -> Result<Request> {
        let mut request = self.request(method, path, params, api::MIME_JSON)?;
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(api::MIME_JSON));
        *request.body_mut() = Some(body.clone().into());
        Ok(request)
    }

    fn sign(&self, request: &mut Request) -> Result<()> {
        let token = HeaderValue::from_str(&self.login.read().unwrap_or_else(PoisonError::into_inner).token)?;
        request.headers_mut().insert(header::AUTHORIZATION, token);
        Ok(())
    }

    /// Send loop.
    ///
    /// `build` runs on every attempt so each attempt carries a fresh body.
    pub(crate) async fn send<B>(&self, build: B) -> Result<Response>
    where
        B: Fn() -> Result<Request> + Send + Sync,
    {
        if let Some(err) = self.error() {
            return Err(err.into());
        }
        let mut attempt = 0;
        let mut refreshed = false;
        loop {
            let mut request = build()?;
            self.sign(&mut request)?;
            let method = request.method().clone();
            let path = request.url().path().to_string();

            let response = match self.sender.send(request).await {
                Ok(response) => response,
                Err(Error::Network(err)) if attempt < self.retry => {
                    attempt += 1;
                    warn!("{err} (retry {attempt}/{})", self.retry);
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
                Err(Error::Network(err)) => {
                    self.latch(&err);
                    return Err(err.into());
                }
                Err(err) => return Err(err),
            };

            let status = response.status();
            info!("|{}|  {} {}", status.as_u16(), method, path);
            if status == StatusCode::GATEWAY_TIMEOUT && attempt < self.retry {
                attempt += 1;
                warn!("gateway timeout: {method} {path} (retry {attempt}/{})", self.retry);
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }
            if status == StatusCode::UNAUTHORIZED && !refreshed && self.refresh_token(&path).await? {
                refreshed = true;
                continue;
            }
            return Ok(response);
        }
    }

    /// Renew the token after a 401.
    ///
    /// Returns whether a new token was adopted. A network failure latches
    /// the client; an error status leaves the original 401 to surface.
    async fn refresh_token(&self, path: &str) -> Result<bool> {
        let refresh = self.login().refresh;
        if refresh.is_empty() || path.ends_with(api::AUTH_REFRESH_ROUTE) {
            return Ok(false);
        }
        let body = Bytes::from(serde_json::to_vec(&Login {
            refresh,
            ..Login::default()
        })?);
        let mut request = self.json_request(Method::POST, api::AUTH_REFRESH_ROUTE, &[], &body)?;
        self.sign(&mut request)?;

        let response = match self.sender.send(request).await {
            Ok(response) => response,
            Err(Error::Network(err)) => {
                self.latch(&err);
                return Err(err.into());
            }
            Err(err) => return Err(err),
        };
        let status = response.status();
        info!("|{}|  POST {}", status.as_u16(), api::AUTH_REFRESH_ROUTE);
        if !status.is_success() {
            return Ok(false);
        }
        let mut login = Login::default();
        self.decode(&Method::POST, response, &mut login).await?;
        if login.token.is_empty() {
            return Ok(false);
        }
        debug!("token refreshed");
        let mut current = self.login.write().unwrap_or_else(PoisonError::into_inner);
        current.token = login.token;
        if !login.refresh.is_empty() {
            current.refresh = login.refresh;
        }
        Ok(true)
    }

    /// Map an error status into the taxonomy; pass 2xx/3xx through.
    pub(crate) async fn check(&self, method: &Method, response: Response) -> Result<Response> {
        let status = response.status();
        if status.as_u16() < 400 {
            return Ok(response);
        }
        let path = response.url().path().to_string();
        let body = response.bytes().await.unwrap_or_default();
        Err(RestError::new(status, method.as_str(), &path)
            .with_body(&body)
            .into())
    }

    /// Decode a JSON body into `out`.
    ///
    /// 204/202 and empty bodies leave `out` unchanged, unless the client was
    /// configured with `strict_body`.
    pub(crate) async fn decode<T: DeserializeOwned>(
        &self,
        method: &Method,
        response: Response,
        out: &mut T,
    ) -> Result<()> {
        let response = self.check(method, response).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::ACCEPTED {
            return Ok(());
        }
        let path = response.url().path().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Request(chain(&e)))?;
        if body.is_empty() {
            if self.strict_body {
                return Err(Error::EmptyBody {
                    status: status.as_u16(),
                    method: method.to_string(),
                    path,
                });
            }
            return Ok(());
        }
        *out = serde_json::from_slice(&body)?;
        Ok(())
    }
}

pub(crate) fn is_dir(path: &Path, must: bool) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(md) => Ok(md.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ClientOptions;

    fn client(base: &str) -> Client {
        Client::new(ClientOptions::new(base)).unwrap()
    }

    #[test]
    fn test_url_join() {
        let c = client("http://hub:8080");
        assert_eq!(c.url("/applications/1", &[]).as_str(), "http://hub:8080/applications/1");

        let c = client("http://hub:8080/hub/");
        assert_eq!(c.url("/buckets/1/", &[]).as_str(), "http://hub:8080/hub/buckets/1/");
    }

    #[test]
    fn test_url_params_encoded() {
        let c = client("http://hub");
        let url = c.url("/applications", &[Param::new("filter", "name='a b',id>1")]);
        assert_eq!(url.path(), "/applications");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("filter".to_string(), "name='a b',id>1".to_string())]);
    }

    #[test]
    fn test_bad_base_url() {
        let err = Client::new(ClientOptions::new("not a url")).err().unwrap();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn test_is_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(is_dir(tmp.path(), true).unwrap());
        let missing = tmp.path().join("missing");
        assert!(!is_dir(&missing, false).unwrap());
        assert!(is_dir(&missing, true).is_err());
        let file = tmp.path().join("f");
        std::fs::write(&file, "x").unwrap();
        assert!(!is_dir(&file, true).unwrap());
    }

    #[test]
    fn test_token_and_reset() {
        let c = client("http://hub");
        c.set_token("Bearer t1");
        assert_eq!(c.login().token, "Bearer t1");
        c.latch(&NetworkError::new("GET", "/x", "refused"));
        assert!(c.error().is_some());
        c.reset();
        assert!(c.error().is_none());
    }
}
