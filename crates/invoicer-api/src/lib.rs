// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use invoicer_app::{Invoice, InvoiceId, InvoicePage, InvoicePatch, InvoiceQuery, NewInvoice};
use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const APP_NAME: &str = "invoicer";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const PDF_MIME: &str = "application/pdf";
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(
        "cannot reach {base_url} -- start the invoice server or set [api].base_url ({detail})"
    )]
    Connection { base_url: String, detail: String },
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
    #[error("{0}")]
    InvalidUpload(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PdfRemoval {
    Record(Invoice),
    Message {
        #[allow(dead_code)]
        message: String,
    },
}

/// Blocking client for the invoice HTTP API. One call is one round trip;
/// nothing is retried.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_url(&self, query: &InvoiceQuery) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/invoices", self.base_url))
            .context("build invoice list URL")?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        Ok(url)
    }

    pub fn pdf_url(&self, id: InvoiceId) -> String {
        format!("{}/invoices/{id}/pdf", self.base_url)
    }

    pub fn list_invoices(&self, query: &InvoiceQuery) -> Result<InvoicePage> {
        let url = self.list_url(query)?;
        let response = self.send(self.http.get(url))?;
        let response = expect_success(response, "failed to fetch invoices")?;
        Ok(decode(response, "invoice page")?)
    }

    pub fn get_invoice(&self, id: InvoiceId) -> Result<Invoice> {
        let response = self.send(self.http.get(self.invoice_url(id)))?;
        let response = expect_success(response, "failed to fetch invoice")?;
        Ok(decode(response, "invoice")?)
    }

    pub fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice> {
        let response = self.send(
            self.http
                .post(format!("{}/invoices", self.base_url))
                .json(invoice),
        )?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body, "failed to create invoice").into());
        }
        Ok(decode(response, "created invoice")?)
    }

    pub fn update_invoice(&self, id: InvoiceId, patch: &InvoicePatch) -> Result<Invoice> {
        if patch.is_empty() {
            bail!("nothing to update -- pick a field and enter a value");
        }
        let response = self.send(self.http.patch(self.invoice_url(id)).json(patch))?;
        let response = expect_success(response, "failed to update invoice")?;
        Ok(decode(response, "updated invoice")?)
    }

    pub fn upload_invoice_pdf(&self, id: InvoiceId, path: &Path) -> Result<Invoice> {
        let file_name = upload_file_name(path)?;
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidUpload(format!(
                "{} is empty -- choose a non-empty PDF and retry",
                path.display()
            ))
            .into());
        }

        debug!(%id, file = %file_name, size = bytes.len(), "uploading invoice pdf");
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(PDF_MIME)
            .context("build upload part")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self.send(
            self.http
                .post(format!("{}/upload-pdf", self.invoice_url(id)))
                .multipart(form),
        )?;
        let response = expect_success(response, "upload failed")?;
        Ok(decode(response, "uploaded invoice")?)
    }

    pub fn delete_invoice_pdf(&self, id: InvoiceId) -> Result<Invoice> {
        let response = self.send(self.http.delete(self.pdf_url(id)))?;
        let response = expect_success(response, "remove failed")?;
        match decode::<PdfRemoval>(response, "pdf removal")? {
            PdfRemoval::Record(invoice) => Ok(invoice),
            PdfRemoval::Message { .. } => self.get_invoice(id),
        }
    }

    pub fn delete_invoice(&self, id: InvoiceId) -> Result<()> {
        let response = self.send(self.http.delete(self.invoice_url(id)))?;
        expect_success(response, "delete failed")?;
        Ok(())
    }

    /// Fetches the attached PDF into `dir` and returns the written path.
    pub fn download_pdf(&self, id: InvoiceId, dir: &Path) -> Result<PathBuf> {
        let response = self.send(self.http.get(self.pdf_url(id)))?;
        let response = expect_success(response, "download failed")?;
        let bytes = response.bytes().map_err(|error| ApiError::Decode {
            what: "pdf body",
            detail: error.to_string(),
        })?;

        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(format!("invoice-{id}.pdf"));
        fs::write(&path, &bytes).with_context(|| format!("write {}", path.display()))?;
        debug!(%id, path = %path.display(), size = bytes.len(), "downloaded invoice pdf");
        Ok(path)
    }

    fn invoice_url(&self, id: InvoiceId) -> String {
        format!("{}/invoices/{id}", self.base_url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        debug!(
            url = %response.url(),
            status = response.status().as_u16(),
            "api response"
        );
        Ok(response)
    }
}

fn expect_success(response: Response, message: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "{message}");
    Err(ApiError::Status {
        status: status.as_u16(),
        message: message.to_owned(),
    })
}

fn decode<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T, ApiError> {
    response.json().map_err(|error| ApiError::Decode {
        what,
        detail: error.to_string(),
    })
}

fn upload_file_name(path: &Path) -> Result<String, ApiError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::InvalidUpload(
            "no file selected -- enter the path to a PDF".to_owned(),
        ));
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ApiError::InvalidUpload(format!(
            "{name} is not a PDF -- choose a file ending in .pdf"
        )));
    }
    Ok(name.to_owned())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> ApiError {
    warn!(base_url, error = %error, "api unreachable");
    ApiError::Connection {
        base_url: base_url.to_owned(),
        detail: error.to_string(),
    }
}

fn clean_error_response(status: StatusCode, body: &str, fallback: &str) -> ApiError {
    let status = status.as_u16();
    warn!(status, body, "{fallback}");

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.trim().is_empty()
    {
        return ApiError::Status {
            status,
            message: error.trim().to_owned(),
        };
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') && !trimmed.contains('<')
    {
        return ApiError::Status {
            status,
            message: trimmed.to_owned(),
        };
    }

    ApiError::Status {
        status,
        message: fallback.to_owned(),
    }
}

pub fn pdf_cache_dir() -> Result<PathBuf> {
    let cache_root = dirs::cache_dir().ok_or_else(|| {
        anyhow!("cannot resolve cache directory; set XDG_CACHE_HOME or platform equivalent")
    })?;
    let dir = cache_root.join(APP_NAME).join("pdf");
    fs::create_dir_all(&dir)
        .with_context(|| format!("create cache directory {}", dir.display()))?;
    Ok(dir)
}

pub fn evict_stale_cache(dir: &Path, ttl_days: i64) -> Result<usize> {
    if ttl_days <= 0 || !dir.exists() {
        return Ok(0);
    }

    let ttl_secs = u64::try_from(ttl_days)
        .ok()
        .and_then(|days| days.checked_mul(24 * 60 * 60))
        .ok_or_else(|| anyhow!("ttl_days is too large: {ttl_days}"))?;
    let ttl = Duration::from_secs(ttl_secs);
    let now = SystemTime::now();

    let mut removed = 0usize;
    for entry in fs::read_dir(dir).with_context(|| format!("read cache dir {}", dir.display()))? {
        let entry = entry?;
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if now.duration_since(modified).unwrap_or(Duration::ZERO) > ttl
            && fs::remove_file(entry.path()).is_ok()
        {
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(removed, dir = %dir.display(), "evicted stale pdf cache entries");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::{ApiError, Client, clean_error_response, evict_stale_cache, upload_file_name};
    use invoicer_app::{InvoiceFilters, InvoiceId, InvoiceStatus, QueryState};
    use reqwest::StatusCode;
    use std::path::Path;
    use std::time::Duration;

    fn client() -> Client {
        Client::new("http://127.0.0.1:5000/", Duration::from_secs(1)).expect("client")
    }

    #[test]
    fn new_trims_trailing_slash_and_rejects_empty() {
        assert_eq!(client().base_url(), "http://127.0.0.1:5000");
        let error = Client::new("  ", Duration::from_secs(1)).expect_err("empty url");
        assert!(error.to_string().contains("api.base_url"));
        assert!(Client::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn list_url_omits_empty_filters() {
        let state = QueryState {
            filters: InvoiceFilters {
                status: Some(InvoiceStatus::Paid),
                ..InvoiceFilters::default()
            },
            ..QueryState::default()
        };
        let url = client().list_url(&state.to_query()).expect("url");
        assert_eq!(url.path(), "/invoices");
        assert_eq!(url.query(), Some("page=1&limit=10&status=paid"));
    }

    #[test]
    fn list_url_encodes_client_text() {
        let state = QueryState {
            filters: InvoiceFilters {
                client: "Acme & Sons".to_owned(),
                ..InvoiceFilters::default()
            },
            ..QueryState::default()
        };
        let url = client().list_url(&state.to_query()).expect("url");
        assert_eq!(url.query(), Some("page=1&limit=10&client=Acme+%26+Sons"));
    }

    #[test]
    fn pdf_url_points_at_record() {
        assert_eq!(
            client().pdf_url(InvoiceId::new(4)),
            "http://127.0.0.1:5000/invoices/4/pdf"
        );
    }

    #[test]
    fn error_body_prefers_server_text() {
        let error = clean_error_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invoice_number, client_name, amount are required"}"#,
            "failed to create invoice",
        );
        assert_eq!(
            error.to_string(),
            "invoice_number, client_name, amount are required"
        );
        assert_eq!(error.status(), Some(400));

        let plain = clean_error_response(StatusCode::CONFLICT, "duplicate number", "fallback");
        assert_eq!(plain.to_string(), "duplicate number");

        let html = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html><body>boom</body></html>",
            "failed to create invoice",
        );
        assert_eq!(html.to_string(), "failed to create invoice");
    }

    #[test]
    fn upload_name_must_end_in_pdf() {
        assert_eq!(
            upload_file_name(Path::new("/tmp/Scan.PDF")).expect("pdf name"),
            "Scan.PDF"
        );
        let error = upload_file_name(Path::new("/tmp/notes.txt")).expect_err("not pdf");
        assert!(matches!(error, ApiError::InvalidUpload(_)));
        assert!(error.to_string().contains(".pdf"));
    }

    #[test]
    fn evict_ignores_missing_dir_and_zero_ttl() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("invoice-1.pdf"), b"%PDF").expect("write");
        assert_eq!(evict_stale_cache(dir.path(), 0).expect("evict"), 0);
        assert_eq!(evict_stale_cache(dir.path(), 30).expect("evict"), 0);
        assert!(dir.path().join("invoice-1.pdf").exists());
        assert_eq!(
            evict_stale_cache(&dir.path().join("missing"), 30).expect("evict"),
            0
        );
    }
}
