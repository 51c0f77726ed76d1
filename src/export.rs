//! # Export Pipeline
//!
//! HTML in, paginated HTML (or PDF bytes) out. Each export mounts its own
//! copy of the document on a rendering surface, paginates it there, and
//! tears the surface down on every exit path.
//!
//! ```text
//!   html ─→ [Surface::mount] ─→ paginate ─→ serialize ─→ RenderRequest ─→ backend ─→ PDF
//!                 └──────────── detach on drop ───────────┘
//! ```

use base64::Engine;
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::dom::{html, Document};
use crate::error::FolioError;
use crate::geometry::LayoutProbe;
use crate::paginate::{paginate, PaginationReport};
use crate::style::Edges;

/// An isolated document mounted on a layout probe.
///
/// Dropping the surface detaches it from the probe, whether the export
/// finished, failed, or returned early.
pub struct Surface<'p> {
    probe: &'p dyn LayoutProbe,
    doc: Document,
}

impl<'p> Surface<'p> {
    /// Parse `html` into a fresh document and attach it to `probe`.
    pub fn mount(html: &str, probe: &'p dyn LayoutProbe) -> Result<Self, FolioError> {
        let doc = html::parse(html)?;
        let surface = Self { probe, doc };
        surface.probe.attach(&surface.doc)?;
        log::debug!("mounted document {} ({} nodes)", surface.doc.id(), surface.doc.node_count());
        Ok(surface)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn paginate(&mut self, config: &PaginationConfig) -> PaginationReport {
        paginate(&mut self.doc, self.probe, config)
    }

    pub fn to_html(&self) -> String {
        html::serialize(&self.doc)
    }
}

impl Drop for Surface<'_> {
    fn drop(&mut self) {
        self.probe.detach();
        log::debug!("detached document {}", self.doc.id());
    }
}

/// Paginated markup plus what the engine did to it.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated {
    pub html: String,
    pub report: PaginationReport,
}

/// Paginate an HTML document on its own surface.
pub fn export_html(
    html: &str,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
) -> Result<Paginated, FolioError> {
    let mut surface = Surface::mount(html, probe)?;
    let report = surface.paginate(config);
    Ok(Paginated {
        html: surface.to_html(),
        report,
    })
}

// ── Render backend contract ─────────────────────────────────────

/// Sheet size requested from the conversion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    Letter,
    A4,
    Legal,
}

/// Layout options sent along with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub format: PageFormat,
    /// Printer margins in CSS pixels. Pages carry their own padding, so
    /// these are usually zero.
    pub margins: Edges,
    /// How long the service lets the document settle before printing.
    pub settle_delay_ms: u64,
    /// Send the HTML zlib-compressed and base64-encoded.
    pub compress: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: PageFormat::Letter,
            margins: Edges::default(),
            settle_delay_ms: 500,
            compress: true,
        }
    }
}

/// Body of the conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_deflate_base64: Option<String>,
    /// `identity` or `deflate-base64`.
    pub encoding: String,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(html: &str, options: RenderOptions) -> Self {
        if options.compress {
            let packed = compress_to_vec_zlib(html.as_bytes(), 6);
            Self {
                html: None,
                html_deflate_base64: Some(base64::engine::general_purpose::STANDARD.encode(packed)),
                encoding: "deflate-base64".to_string(),
                options,
            }
        } else {
            Self {
                html: Some(html.to_string()),
                html_deflate_base64: None,
                encoding: "identity".to_string(),
                options,
            }
        }
    }

    /// Recover the document markup, as the service would.
    pub fn decode_html(&self) -> Result<String, FolioError> {
        if let Some(html) = &self.html {
            return Ok(html.clone());
        }
        let encoded = self.html_deflate_base64.as_deref().ok_or_else(|| FolioError::Backend {
            status: None,
            message: "request carries no document".to_string(),
        })?;
        let packed = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| FolioError::Backend {
                status: None,
                message: format!("invalid base64 payload: {e}"),
            })?;
        let raw = decompress_to_vec_zlib(&packed).map_err(|e| FolioError::Backend {
            status: None,
            message: format!("invalid deflate payload: {e:?}"),
        })?;
        String::from_utf8(raw).map_err(|e| FolioError::Backend {
            status: None,
            message: format!("payload is not UTF-8: {e}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
    message: Option<String>,
    details: Option<serde_json::Value>,
}

/// Interpret a conversion response: PDF bytes on success, otherwise the
/// service's JSON error envelope as [`FolioError::Backend`].
pub fn decode_render_response(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Vec<u8>, FolioError> {
    let is_pdf = content_type.is_some_and(|ct| ct.trim_start().starts_with("application/pdf"))
        || body.starts_with(b"%PDF");
    if (200..300).contains(&status) && is_pdf {
        return Ok(body.to_vec());
    }

    let status = Some(status);
    let message = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let mut message = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "unknown error".to_string());
            match envelope.details {
                Some(serde_json::Value::String(details)) => message = format!("{message} ({details})"),
                Some(details) if !details.is_null() => message = format!("{message} ({details})"),
                _ => {}
            }
            message
        }
        Err(_) => format!(
            "unexpected {} response of {} bytes",
            content_type.unwrap_or("untyped"),
            body.len()
        ),
    };
    Err(FolioError::Backend { status, message })
}

/// Something that turns final HTML into PDF bytes.
pub trait RenderBackend {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, FolioError>;
}

/// Conversion service reached over HTTP.
#[cfg(feature = "http")]
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FolioError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[cfg(feature = "http")]
impl RenderBackend for HttpBackend {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, FolioError> {
        log::info!("posting document to {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(request).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?;
        decode_render_response(status, content_type.as_deref(), &body)
    }
}

/// Paginate `html` and hand the result to `backend`.
pub fn export_pdf(
    html: &str,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
    options: RenderOptions,
    backend: &dyn RenderBackend,
) -> Result<Vec<u8>, FolioError> {
    let paginated = export_html(html, probe, config)?;
    if paginated.report.overflowing_pages > 0 {
        log::warn!(
            "{} page(s) still overflow; rendering anyway",
            paginated.report.overflowing_pages
        );
    }
    let request = RenderRequest::new(&paginated.html, options);
    backend.render(&request)
}
