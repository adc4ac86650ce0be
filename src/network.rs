/*
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{
    blocking::multipart::{Form, Part},
    blocking::Client as HttpClient,
    blocking::ClientBuilder as HttpClientBuilder,
    blocking::RequestBuilder,
    blocking::Response,
    header::HeaderValue,
    header::ACCEPT,
    header::AUTHORIZATION,
    header::CONTENT_TYPE,
    header::IF_MATCH,
    header::LOCATION,
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::RedfishError;

pub const REDFISH_ENDPOINT: &str = "/redfish/v1";
pub const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";
const SESSION_SERVICE_PATH: &str = "/redfish/v1/SessionService";
const X_AUTH_TOKEN: &str = "X-Auth-Token";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_RETRY: u32 = 3;
/// Applies to firmware uploads instead of the per-request timeout.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How the client authenticates against the BMC.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Redfish session: POST to the Sessions collection, then X-Auth-Token.
    #[default]
    Session,
    /// HTTP basic auth on every request.
    Basic,
}

impl FromStr for AuthMode {
    type Err = std::convert::Infallible;

    // Anything that is not "basic" falls back to a session login.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "basic" => AuthMode::Basic,
            _ => AuthMode::Session,
        })
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Session => f.write_str("session"),
            AuthMode::Basic => f.write_str("basic"),
        }
    }
}

/// A response as the BMC sent it. Non-success statuses are not errors at this
/// level, callers decide which statuses they accept.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    /// `X-Auth-Token` header, only present on session creation.
    pub auth_token: Option<String>,
    pub body: Option<Value>,
    pub text: String,
}

impl RawResponse {
    pub fn json(status: StatusCode, body: Value) -> Self {
        RawResponse {
            status,
            location: None,
            auth_token: None,
            text: body.to_string(),
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        RawResponse {
            status,
            location: None,
            auth_token: None,
            body: None,
            text: String::new(),
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserializes the body into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self, url: &str) -> Result<T, RedfishError> {
        let body = self.body.clone().ok_or_else(|| RedfishError::NoContent {
            url: url.to_string(),
        })?;
        serde_json::from_value(body).map_err(|e| RedfishError::JsonDeserializeError {
            url: url.to_string(),
            body: self.text.clone(),
            source: e,
        })
    }

    /// Turns a non-success response into the matching error.
    pub fn into_error(self, url: &str) -> RedfishError {
        RedfishError::from_status(url, self.status, &self.text)
    }
}

/// Content of one part of a multipart upload.
#[derive(Debug, Clone)]
pub enum PartContent {
    Bytes(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct UploadPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub content: PartContent,
}

impl UploadPart {
    pub fn json(name: &str, value: &Value) -> Self {
        UploadPart {
            name: name.to_string(),
            file_name: None,
            content_type: "application/json".to_string(),
            content: PartContent::Bytes(value.to_string().into_bytes()),
        }
    }

    pub fn file(name: &str, path: &Path) -> Self {
        UploadPart {
            name: name.to_string(),
            file_name: path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned()),
            content_type: "application/octet-stream".to_string(),
            content: PartContent::File(path.to_path_buf()),
        }
    }
}

/// Everything the client needs from an HTTP(S) connection to one BMC.
///
/// Paths are absolute Redfish paths (`/redfish/v1/...`). Implementations
/// must also accept full URLs pointing at the same BMC, as returned in
/// `Location` headers.
pub trait Transport {
    fn base_url(&self) -> &str;

    fn get(&self, path: &str) -> Result<RawResponse, RedfishError>;

    fn post(&self, path: &str, body: &Value) -> Result<RawResponse, RedfishError>;

    /// PATCH, guarded by `If-Match` when an etag is given.
    fn patch(&self, path: &str, body: &Value, etag: Option<&str>)
        -> Result<RawResponse, RedfishError>;

    fn delete(&self, path: &str) -> Result<RawResponse, RedfishError>;

    /// POST a file as application/octet-stream.
    fn post_binary(&self, path: &str, image: &Path) -> Result<RawResponse, RedfishError>;

    fn post_multipart(&self, path: &str, parts: &[UploadPart])
        -> Result<RawResponse, RedfishError>;

    fn login(&mut self, username: &str, password: &str, auth: AuthMode)
        -> Result<(), RedfishError>;

    fn logout(&mut self) -> Result<(), RedfishError>;

    fn session_key(&self) -> Option<&str>;

    fn authorization_key(&self) -> Option<&str>;

    fn clear_credentials(&mut self);
}

// to_resource_path strips scheme and authority from a full URL so that
// everything the client stores is a plain Redfish path.
pub fn to_resource_path(uri: &str) -> String {
    let path = match uri.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => uri,
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// The endpoint that the redfish client connects to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address of BMC
    pub host: String,
    /// BMC port. If absent the default HTTPS port 443 will be used
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn base_url(&self) -> String {
        // Bare IPv6 addresses need brackets in a URL.
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(p) => format!("https://{host}:{p}"),
            None => format!("https://{host}"),
        }
    }
}

#[derive(Debug)]
pub struct RedfishHttpClientBuilder {
    timeout: Duration,
    upload_timeout: Duration,
    max_retry: u32,
    ca_file: Option<PathBuf>,
    accept_invalid_certs: bool,
}

impl Default for RedfishHttpClientBuilder {
    fn default() -> Self {
        RedfishHttpClientBuilder {
            timeout: DEFAULT_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            max_retry: DEFAULT_MAX_RETRY,
            ca_file: None,
            // BMCs often have a self-signed cert, so usually this has to be true
            accept_invalid_certs: true,
        }
    }
}

impl RedfishHttpClientBuilder {
    /// Trusts the certificate(s) in this PEM file and rejects invalid ones.
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self.accept_invalid_certs = false;
        self
    }

    /// Overwrites the timeout that will be applied to every request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout for firmware image uploads, which take far longer than any
    /// other request.
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// How many times a GET or DELETE that timed out is sent again.
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn build(&self, endpoint: Endpoint) -> Result<RedfishHttpClient, RedfishError> {
        let base_url = endpoint.base_url();
        let mut builder = HttpClientBuilder::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .timeout(self.timeout);
        if let Some(path) = &self.ca_file {
            let pem = fs::read(path).map_err(|e| {
                RedfishError::FileError(format!("failed to read CA file {}: {e}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                RedfishError::ConfigError(format!("invalid CA file {}: {e}", path.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let http_client = builder.build().map_err(|e| RedfishError::NetworkError {
            url: base_url.clone(),
            source: e,
        })?;
        Ok(RedfishHttpClient {
            endpoint,
            base_url,
            http_client,
            upload_timeout: self.upload_timeout,
            max_retry: self.max_retry,
            session: None,
            authorization: None,
        })
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    location: Option<String>,
}

/// A HTTP client which targets a single BMC
pub struct RedfishHttpClient {
    endpoint: Endpoint,
    base_url: String,
    http_client: HttpClient,
    upload_timeout: Duration,
    max_retry: u32,
    session: Option<Session>,
    authorization: Option<String>,
}

impl RedfishHttpClient {
    pub fn builder() -> RedfishHttpClientBuilder {
        RedfishHttpClientBuilder::default()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, to_resource_path(path))
    }

    fn authenticate(&self, req: RequestBuilder) -> RequestBuilder {
        match (&self.session, &self.authorization) {
            (Some(session), _) => req.header(X_AUTH_TOKEN, session.token.as_str()),
            (None, Some(auth)) => req.header(AUTHORIZATION, auth.as_str()),
            (None, None) => req,
        }
    }

    fn json_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        etag: Option<&str>,
    ) -> Result<RawResponse, RedfishError> {
        let body_enc = body.map(|b| b.to_string());
        self.send(
            &method,
            path,
            body_enc.as_deref().unwrap_or_default(),
            None,
            |client, url| {
                let mut req_b = client
                    .request(method.clone(), url)
                    .header(ACCEPT, HeaderValue::from_static("application/json"))
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                if let Some(tag) = etag {
                    req_b = req_b.header(IF_MATCH, tag);
                }
                if let Some(b) = &body_enc {
                    req_b = req_b.body(b.clone());
                }
                Ok(req_b)
            },
        )
    }

    // All the HTTP requests happen from here. `build` is called once per
    // attempt since request bodies cannot be reused after a send.
    fn send<F>(
        &self,
        method: &Method,
        path: &str,
        body_log: &str,
        override_timeout: Option<Duration>,
        build: F,
    ) -> Result<RawResponse, RedfishError>
    where
        F: Fn(&HttpClient, &str) -> Result<RequestBuilder, RedfishError>,
    {
        let url = self.url(path);
        debug!("TX {} {} {}", method, url, body_log);
        let max_retry = if retries_on_timeout(method) {
            self.max_retry
        } else {
            0
        };
        let mut attempt = 0;
        loop {
            let mut req_b = self.authenticate(build(&self.http_client, &url)?);
            if let Some(t) = override_timeout {
                req_b = req_b.timeout(t);
            }
            match req_b.send() {
                Ok(response) => return read_response(&url, response),
                Err(e) if e.is_timeout() && attempt < max_retry => {
                    attempt += 1;
                    warn!("{method} {url} timed out, retry {attempt}/{}", self.max_retry);
                }
                Err(e) => return Err(RedfishError::NetworkError { url, source: e }),
            }
        }
    }

    fn session_login(&mut self, username: &str, password: &str) -> Result<(), RedfishError> {
        let body = serde_json::json!({"UserName": username, "Password": password});
        let url = self.url(SESSIONS_PATH);
        // Credentials are not logged.
        let response = self.send(&Method::POST, SESSIONS_PATH, "{...}", None, |client, url| {
            Ok(client
                .post(url)
                .header(ACCEPT, HeaderValue::from_static("application/json"))
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.to_string()))
        })?;
        if !response.is_success() {
            return Err(RedfishError::LoginFailed {
                message: response.into_error(&url).to_string(),
                url,
            });
        }
        let token = response.auth_token.clone().ok_or_else(|| RedfishError::LoginFailed {
            url: url.clone(),
            message: "BMC did not return an X-Auth-Token".to_string(),
        })?;
        self.session = Some(Session {
            token,
            location: response.location.as_deref().map(to_resource_path),
        });
        Ok(())
    }

    fn basic_login(&mut self, username: &str, password: &str) -> Result<(), RedfishError> {
        self.authorization = Some(format!(
            "Basic {}",
            STANDARD.encode(format!("{username}:{password}"))
        ));
        let response = self.get(SESSION_SERVICE_PATH);
        match response {
            Ok(r) if r.is_success() => Ok(()),
            Ok(r) => {
                self.authorization = None;
                let url = self.url(SESSION_SERVICE_PATH);
                Err(RedfishError::LoginFailed {
                    message: r.into_error(&url).to_string(),
                    url,
                })
            }
            Err(e) => {
                self.authorization = None;
                Err(e)
            }
        }
    }
}

// A POST that timed out may still have been carried out by the BMC, so only
// requests that are safe to repeat are sent again.
fn retries_on_timeout(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
}

fn read_response(url: &str, response: Response) -> Result<RawResponse, RedfishError> {
    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let auth_token = response
        .headers()
        .get(X_AUTH_TOKEN)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    // read the body even if not status 2XX, because BMCs give useful error messages as JSON
    let text = response.text().map_err(|e| RedfishError::NetworkError {
        url: url.to_string(),
        source: e,
    })?;
    if text.is_empty() {
        debug!("RX {status}");
    } else {
        debug!("RX {status} {text}");
    }
    let body = if text.is_empty() {
        None
    } else {
        serde_json::from_str::<Value>(&text).ok()
    };
    Ok(RawResponse {
        status,
        location,
        auth_token,
        body,
        text,
    })
}

impl Transport for RedfishHttpClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> Result<RawResponse, RedfishError> {
        self.json_request(Method::GET, path, None, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<RawResponse, RedfishError> {
        self.json_request(Method::POST, path, Some(body), None)
    }

    fn patch(
        &self,
        path: &str,
        body: &Value,
        etag: Option<&str>,
    ) -> Result<RawResponse, RedfishError> {
        self.json_request(Method::PATCH, path, Some(body), etag)
    }

    fn delete(&self, path: &str) -> Result<RawResponse, RedfishError> {
        self.json_request(Method::DELETE, path, None, None)
    }

    fn post_binary(&self, path: &str, image: &Path) -> Result<RawResponse, RedfishError> {
        let log = format!("<{}>", image.display());
        let timeout = Some(self.upload_timeout);
        self.send(&Method::POST, path, &log, timeout, |client, url| {
            let file = fs::File::open(image).map_err(|e| {
                RedfishError::FileError(format!("could not open {}: {e}", image.display()))
            })?;
            Ok(client
                .post(url)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
                .body(file))
        })
    }

    fn post_multipart(
        &self,
        path: &str,
        parts: &[UploadPart],
    ) -> Result<RawResponse, RedfishError> {
        let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
        let log = format!("multipart {names:?}");
        let timeout = Some(self.upload_timeout);
        self.send(&Method::POST, path, &log, timeout, |client, url| {
            let mut form = Form::new();
            for part in parts {
                form = form.part(part.name.clone(), build_part(part, url)?);
            }
            Ok(client.post(url).multipart(form))
        })
    }

    fn login(
        &mut self,
        username: &str,
        password: &str,
        auth: AuthMode,
    ) -> Result<(), RedfishError> {
        match auth {
            AuthMode::Session => self.session_login(username, password),
            AuthMode::Basic => self.basic_login(username, password),
        }
    }

    fn logout(&mut self) -> Result<(), RedfishError> {
        let Some(location) = self.session.as_ref().and_then(|s| s.location.clone()) else {
            return Ok(());
        };
        let response = self.delete(&location)?;
        if !response.is_success() {
            return Err(response.into_error(&self.url(&location)));
        }
        Ok(())
    }

    fn session_key(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    fn authorization_key(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    fn clear_credentials(&mut self) {
        self.session = None;
        self.authorization = None;
    }
}

fn build_part(part: &UploadPart, url: &str) -> Result<Part, RedfishError> {
    let mut p = match &part.content {
        PartContent::Bytes(b) => Part::bytes(b.clone()),
        PartContent::File(path) => Part::file(path).map_err(|e| {
            RedfishError::FileError(format!("could not open {}: {e}", path.display()))
        })?,
    };
    if let Some(name) = &part.file_name {
        p = p.file_name(name.clone());
    }
    p.mime_str(&part.content_type)
        .map_err(|e| RedfishError::NetworkError {
            url: url.to_string(),
            source: e,
        })
}
