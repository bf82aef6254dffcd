//! Data Transfer Objects for API requests and responses.

use serde::{Deserialize, Serialize};

use super::document_type::DocumentType;
use super::money::Scalar;
use super::sequence::{AdminState, RangeState, SequenceRange};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code (0 = success, non-zero = error).
    pub code: i32,

    /// Human-readable message.
    pub message: String,

    /// Response data (null on error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a success response.
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Create a success response with a custom message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Create a success response with no data.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: None,
        }
    }
}

/// Request to register a new sequence range.
///
/// Fields are loosely typed so every problem can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRangeRequest {
    /// Owning account.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Issuer tax ID; non-digits are stripped.
    #[serde(default, alias = "rnc")]
    pub tax_id: Option<Scalar>,
    /// Document type code.
    #[serde(default, alias = "tipo_comprobante")]
    pub document_type: Option<Scalar>,
    /// Number prefix (defaults to `E`).
    #[serde(default, alias = "prefijo")]
    pub prefix: Option<String>,
    /// First sequence number.
    #[serde(default, alias = "numero_inicial")]
    pub start_number: Option<u64>,
    /// Amount of numbers authorized.
    #[serde(default, alias = "cantidad_numeros")]
    pub quantity: Option<u64>,
    /// Expiration date.
    #[serde(default, alias = "fecha_vencimiento")]
    pub expiration_date: Option<String>,
    /// Absolute alert threshold.
    #[serde(default, alias = "alerta_minima_restante")]
    pub alert_threshold: Option<u64>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Range as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct RangeView {
    /// Stored fields.
    #[serde(flatten)]
    pub range: SequenceRange,
    /// Last number of the window.
    pub end_number: u64,
    /// Numbers still available.
    pub available_count: u64,
}

impl From<SequenceRange> for RangeView {
    fn from(range: SequenceRange) -> Self {
        Self {
            end_number: range.end_number(),
            available_count: range.available(),
            range,
        }
    }
}

/// Query parameters for listing ranges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeListQuery {
    /// Restrict to one owner.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Restrict to one state.
    #[serde(default)]
    pub state: Option<RangeState>,
    /// Restrict to one document type.
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    /// Tax ID substring.
    #[serde(default)]
    pub tax_id: Option<String>,
    /// Only ranges expiring within 30 days.
    #[serde(default)]
    pub expiring_soon: bool,
    /// One-based page.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size (max 100).
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    10
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Current page.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total matching items.
    pub total: usize,
    /// Total pages.
    pub total_pages: usize,
}

/// Aggregates for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateStats {
    /// State.
    pub state: RangeState,
    /// Ranges in this state.
    pub count: usize,
    /// Sum of quantities.
    pub total_numbers: u64,
    /// Sum of consumed counts.
    pub consumed: u64,
    /// Sum of available counts.
    pub available: u64,
}

/// Range statistics for one owner.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RangeStats {
    /// All ranges.
    pub total_ranges: usize,
    /// Usable ranges expiring within 30 days.
    pub expiring_soon: usize,
    /// Ranges in alert.
    pub in_alert: usize,
    /// Per-state breakdown, only states that occur.
    pub by_state: Vec<StateStats>,
}

/// Next number of a range, without consuming it.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    /// Next sequence number.
    pub next_number: u64,
    /// Formatted document number.
    pub formatted_number: String,
    /// Numbers still available.
    pub available_count: u64,
    /// Current state.
    pub state: RangeState,
}

/// Result of consuming one number.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeResponse {
    /// Range the number came from.
    pub range_id: uuid::Uuid,
    /// Consumed sequence number.
    pub consumed_number: u64,
    /// Formatted document number.
    pub formatted_number: String,
    /// State after consumption.
    pub state: RangeState,
    /// Numbers left.
    pub available_count: u64,
    /// Warning when the range is running low or empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
}

/// Administrative state change.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStateRequest {
    /// Requested state.
    pub state: AdminState,
}

/// Request for the next number of a tax ID and document type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumberRequest {
    /// Issuer tax ID.
    #[serde(default)]
    pub rnc: Option<Scalar>,
    /// Document type code.
    #[serde(default)]
    pub tipo_comprobante: Option<Scalar>,
    /// Only report the next number.
    #[serde(default)]
    pub solo_preview: bool,
}

/// Number handed out (or previewed) for a tax ID.
#[derive(Debug, Clone, Serialize)]
pub struct NumberResponse {
    /// Sequence number.
    pub number: u64,
    /// Formatted document number.
    pub formatted_number: String,
    /// Whether the number was only previewed.
    pub preview: bool,
    /// Numbers left in the range.
    pub available_count: u64,
    /// Range state.
    pub state: RangeState,
    /// Range expiration, `DD-MM-YYYY`.
    pub expiration_date: Option<String>,
    /// Whether the range is in alert or exhausted.
    pub low_stock: bool,
    /// Warning text.
    pub alert_message: Option<String>,
    /// Tax ID.
    pub tax_id: String,
    /// Document type.
    pub document_type: DocumentType,
    /// Prefix.
    pub prefix: String,
}

/// Status query by document number.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQueryRequest {
    /// Document number.
    pub ncf: String,
}

/// File formats available for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    /// Signed XML.
    Xml,
    /// Printable PDF.
    Pdf,
}

impl DownloadFormat {
    /// Extension as sent upstream.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Pdf => "pdf",
        }
    }

    /// MIME type of the decoded file.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Pdf => "application/pdf",
        }
    }
}

/// Download of a certified document.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    /// Issuer tax ID; defaults to the configured one.
    #[serde(default)]
    pub rnc: Option<String>,
    /// Document number.
    #[serde(alias = "documento")]
    pub ncf: String,
    /// File format.
    #[serde(alias = "extension")]
    pub format: DownloadFormat,
}

/// Verification link from individual values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrLinkRequest {
    /// Prebuilt URL, returned unchanged.
    #[serde(default)]
    pub url: Option<String>,
    /// Issuer tax ID.
    #[serde(default)]
    pub rnc: Option<String>,
    /// Buyer tax ID.
    #[serde(default)]
    pub rnc_comprador: Option<String>,
    /// Document number.
    #[serde(default)]
    pub ncf: Option<String>,
    /// Security code.
    #[serde(default)]
    pub codigo: Option<String>,
    /// Issue date.
    #[serde(default)]
    pub fecha: Option<String>,
    /// Signature date.
    #[serde(default)]
    pub fecha_firma: Option<String>,
    /// Grand total.
    #[serde(default)]
    pub monto: Option<Scalar>,
    /// Document type.
    #[serde(default)]
    pub tipo: Option<Scalar>,
}

/// Verification link.
#[derive(Debug, Clone, Serialize)]
pub struct QrLinkResponse {
    /// URL to encode in the QR image.
    pub url: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Service version.
    pub version: String,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Overall readiness status.
    pub ready: bool,

    /// Individual component statuses.
    pub components: ReadyComponents,
}

/// Component readiness statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyComponents {
    /// Storage backend status.
    pub storage: bool,
}
