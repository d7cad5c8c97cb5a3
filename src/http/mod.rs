//! Thin HTTP boundary: one shared `reqwest::Client`, the `X-Dataverse-key`
//! auth header, and the handful of request shapes every driver needs
//! (plain GET, multipart-form POST/PUT, byte-stream PUT, DELETE).
//!
//! Connection pooling is `reqwest`'s own job; the orchestrator's semaphore
//! bounds how many requests are in flight at once (§5).

pub mod lock;
pub mod urls;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

const AUTH_HEADER: &str = "X-Dataverse-key";

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    pub base_url: Url,
    api_key: String,
}

impl Client {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Client {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-dataverse-key"),
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::configuration(format!("invalid API key header value: {e}")))?,
        );
        Ok(headers)
    }

    /// `GET url`, expecting a JSON body, with the auth header attached.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Self::json_or_status_error(resp).await
    }

    /// `GET url`, returning the raw response body (used where the caller
    /// needs custom parsing, e.g. the dataset-inventory's nested shape).
    pub async fn get_text(&self, url: Url) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::from_status(status.as_u16(), body))
        }
    }

    /// `GET url` returning the raw status code, for the capability probe
    /// (§4.7 step 4), which treats 404 and 2xx both as meaningful non-errors.
    pub async fn get_status(&self, url: Url) -> Result<u16> {
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }

    /// `DELETE url` (used for multipart abort and, in principle, lock
    /// deletion — though the client never deletes locks itself, §4.1).
    pub async fn delete(&self, url: Url) -> Result<()> {
        let resp = self
            .http
            .delete(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Self::ok_or_status_error(resp).await
    }

    /// `PUT url` with a raw byte body and `Content-Length`; returns the
    /// response's `ETag` header if present (multipart part uploads).
    pub async fn put_bytes(
        &self,
        url: Url,
        body: Vec<u8>,
        extra_headers: &[(&str, &str)],
    ) -> Result<Option<String>> {
        let mut req = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, body.len() as u64);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        let resp = req.body(body).send().await?;
        let etag = resp
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let resp = Self::ok_response_or_status_error(resp).await?;
        let _ = resp;
        Ok(etag)
    }

    /// `PUT url` with a JSON body, auth header attached (multipart Complete
    /// call — relative to the server base, not S3, so it needs the same
    /// `X-Dataverse-key` every other server request carries, §6).
    pub async fn put_json<B: serde::Serialize>(&self, url: Url, body: &B) -> Result<()> {
        let resp = self
            .http
            .put(url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;
        Self::ok_or_status_error(resp).await
    }

    /// `POST url` with a multipart form, auth header attached (all
    /// registration, native-upload, and metadata-update calls).
    pub async fn post_multipart(&self, url: Url, form: reqwest::multipart::Form) -> Result<()> {
        let resp = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await?;
        Self::ok_or_status_error(resp).await
    }

    async fn json_or_status_error<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.json::<T>().await?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::from_status(status.as_u16(), body))
        }
    }

    async fn ok_or_status_error(resp: reqwest::Response) -> Result<()> {
        Self::ok_response_or_status_error(resp).await.map(|_| ())
    }

    async fn ok_response_or_status_error(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::from_status(status.as_u16(), body))
        }
    }
}
