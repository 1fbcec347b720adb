//! Azure Blob Storage over its REST API, authorised with the account's
//! Shared Key.

use crate::{
    models::blob::{BlobItem, BlobMetadata},
    services::{
        blob_store::{BlobStore, StoreError, StoreResult},
        blob_xml,
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    Client, Method, Response, StatusCode, Url,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::debug;

const API_VERSION: &str = "2021-08-06";

/// Account name plus the base64 key exactly as the portal shows it.
#[derive(Clone)]
pub struct StorageCredentials {
    pub account: String,
    pub access_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account", &self.account)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AzureBlobStore {
    client: Client,
    account: String,
    key: Vec<u8>,
    /// Service root without trailing slash, e.g. `https://acct.blob.core.windows.net`.
    endpoint: String,
}

impl AzureBlobStore {
    /// Build a store for `credentials`, talking to `endpoint` when given
    /// (path-style, e.g. an emulator at `http://127.0.0.1:10000/devstoreaccount1`)
    /// and to the public endpoint otherwise.
    pub fn new(credentials: &StorageCredentials, endpoint: Option<&str>) -> anyhow::Result<Self> {
        let key = general_purpose::STANDARD
            .decode(credentials.access_key.trim())
            .map_err(|err| anyhow::anyhow!("storage access key is not valid base64: {}", err))?;
        let endpoint = match endpoint {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", credentials.account),
        };
        Url::parse(&endpoint)
            .map_err(|err| anyhow::anyhow!("invalid blob endpoint `{}`: {}", endpoint, err))?;

        Ok(Self {
            client: Client::new(),
            account: credentials.account.clone(),
            key,
            endpoint,
        })
    }

    fn container_url(&self, container: &str, query: &[(&str, &str)]) -> StoreResult<Url> {
        let base = format!("{}/{}", self.endpoint, urlencoding::encode(container));
        Url::parse_with_params(&base, query)
            .map_err(|err| StoreError::MalformedResponse(err.to_string()))
    }

    fn blob_url(&self, container: &str, name: &str) -> StoreResult<Url> {
        let encoded: Vec<_> = name.split('/').map(urlencoding::encode).collect();
        let raw = format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(container),
            encoded.join("/")
        );
        Url::parse(&raw).map_err(|_| StoreError::InvalidBlobName(name.to_string()))
    }

    /// Add `x-ms-date`, `x-ms-version` and the `Authorization` header.
    fn sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &mut HeaderMap,
        content_length: usize,
    ) -> StoreResult<()> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));

        let to_sign = string_to_sign(&self.account, method, url, headers, content_length);
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|err| StoreError::InvalidCredentials(err.to_string()))?;
        mac.update(to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        headers.insert(
            "authorization",
            header_value(&format!("SharedKey {}:{}", self.account, signature))?,
        );
        Ok(())
    }

    async fn list_page(&self, container: &str, marker: Option<&str>) -> StoreResult<blob_xml::ListBlobsPage> {
        let mut query = vec![
            ("restype", "container"),
            ("comp", "list"),
            ("include", "metadata"),
        ];
        if let Some(marker) = marker {
            query.push(("marker", marker));
        }
        let url = self.container_url(container, &query)?;

        let mut headers = HeaderMap::new();
        self.sign(&Method::GET, &url, &mut headers, 0)?;
        let response = self.client.get(url).headers(headers).send().await?;
        let response = check_status(response, Some(container)).await?;

        let body = response.text().await?;
        blob_xml::parse_list_blobs(&body).map_err(StoreError::MalformedResponse)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list_blobs(&self, container: &str) -> StoreResult<Vec<BlobItem>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self.list_page(container, marker.as_deref()).await?;
            debug!(
                "listed {} blobs from {} (more: {})",
                page.blobs.len(),
                container,
                page.next_marker.is_some()
            );
            blobs.extend(page.blobs);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(blobs)
    }

    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        metadata: &BlobMetadata,
    ) -> StoreResult<()> {
        let url = self.blob_url(container, name)?;

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, header_value(ct)?);
        }
        for (key, value) in metadata {
            let header = HeaderName::from_bytes(format!("x-ms-meta-{}", key).as_bytes())
                .map_err(|_| StoreError::InvalidMetadata(key.clone()))?;
            headers.insert(header, metadata_value(value)?);
        }
        self.sign(&Method::PUT, &url, &mut headers, body.len())?;

        let response = self.client.put(url).headers(headers).body(body).send().await?;
        check_status(response, Some(container)).await?;
        debug!("put blob {}/{}", container, name);
        Ok(())
    }

    async fn probe(&self) -> StoreResult<()> {
        let url = Url::parse_with_params(
            &format!("{}/", self.endpoint),
            &[("comp", "list"), ("maxresults", "1")],
        )
        .map_err(|err| StoreError::MalformedResponse(err.to_string()))?;
        let mut headers = HeaderMap::new();
        self.sign(&Method::GET, &url, &mut headers, 0)?;
        let response = self.client.get(url).headers(headers).send().await?;
        check_status(response, None).await?;
        Ok(())
    }
}

/// The Shared Key string-to-sign for the blob service.
fn string_to_sign(
    account: &str,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    content_length: usize,
) -> String {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut out = format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n",
        method.as_str(),
        length,
        header(CONTENT_TYPE)
    );

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").trim().to_string(),
            )
        })
        .collect();
    ms_headers.sort();
    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name, value));
    }

    out.push_str(&format!("/{}{}", account, url.path()));
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{}:{}", name, values.join(",")));
    }
    out
}

async fn check_status(response: Response, container: Option<&str>) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if status == StatusCode::NOT_FOUND && code.as_deref() == Some("ContainerNotFound") {
        if let Some(container) = container {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }
    }

    let body = response.text().await.unwrap_or_default();
    let message = blob_xml::error_message(&body)
        .or(code)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    Err(StoreError::Service {
        status: status.as_u16(),
        message,
    })
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| StoreError::InvalidMetadata(value.to_string()))
}

/// Metadata travels in headers, which only carry visible ASCII; anything
/// else, and any value containing `%`, is percent-encoded so listings can
/// decode every value the same way.
fn metadata_value(value: &str) -> StoreResult<HeaderValue> {
    if value.bytes().all(|b| b != b'%' && (b == b' ' || b.is_ascii_graphic())) {
        header_value(value)
    } else {
        header_value(&urlencoding::encode(value))
    }
}
