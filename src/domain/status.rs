//! Canonical document status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status of a submitted document, independent of upstream wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NormalizedStatus {
    /// Accepted by the tax authority.
    #[serde(rename = "APROBADA")]
    Approved,
    /// Still being processed.
    #[serde(rename = "EN_PROCESO")]
    InProgress,
    /// Number invalid or already used.
    #[serde(rename = "NCF_INVALIDO")]
    InvalidNcf,
    /// Number expired.
    #[serde(rename = "NCF_VENCIDO")]
    ExpiredNcf,
    /// Issuer not authorized for the document type.
    #[serde(rename = "RNC_NO_AUTORIZADO")]
    UnauthorizedTaxId,
    /// Document content rejected.
    #[serde(rename = "DATOS_INVALIDOS")]
    InvalidData,
    /// Upstream has no record of the document.
    #[serde(rename = "NO_ENCONTRADO")]
    NotFound,
    /// Rejected.
    #[serde(rename = "RECHAZADA")]
    Rejected,
    /// Voided.
    #[serde(rename = "ANULADA")]
    Voided,
    /// Upstream reported a code we do not know.
    #[serde(rename = "ERROR")]
    Error,
    /// Nothing recognizable in the response.
    #[serde(rename = "DESCONOCIDO")]
    Unknown,
}

impl NormalizedStatus {
    /// Wire name (`APROBADA`, `EN_PROCESO`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APROBADA",
            Self::InProgress => "EN_PROCESO",
            Self::InvalidNcf => "NCF_INVALIDO",
            Self::ExpiredNcf => "NCF_VENCIDO",
            Self::UnauthorizedTaxId => "RNC_NO_AUTORIZADO",
            Self::InvalidData => "DATOS_INVALIDOS",
            Self::NotFound => "NO_ENCONTRADO",
            Self::Rejected => "RECHAZADA",
            Self::Voided => "ANULADA",
            Self::Error => "ERROR",
            Self::Unknown => "DESCONOCIDO",
        }
    }

    /// No further change is expected.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::InProgress | Self::Unknown | Self::NotFound)
    }
}

impl fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw status fields as returned upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatus {
    /// Result code.
    pub code: Option<i64>,
    /// Whether upstream finished processing.
    pub processed: bool,
    /// Free-text status.
    pub text: Option<String>,
}

/// Status query result with the normalized interpretation.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Queried document number.
    pub ncf: String,
    /// Normalized status.
    pub status: NormalizedStatus,
    /// Status text as sent upstream.
    pub raw_status: String,
    /// Upstream message.
    pub message: String,
    /// Hint shown when upstream does not know the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    /// When the query ran.
    pub queried_at: DateTime<Utc>,
    /// Full upstream response.
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_wire_names() {
        for status in [
            NormalizedStatus::Approved,
            NormalizedStatus::UnauthorizedTaxId,
            NormalizedStatus::Unknown,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_final_states() {
        assert!(NormalizedStatus::Approved.is_final());
        assert!(NormalizedStatus::Rejected.is_final());
        assert!(!NormalizedStatus::InProgress.is_final());
    }
}
