//! Annulment of unused document numbers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::dates::parse_dmy_hms;
use super::document_type::DocumentType;
use crate::error::FieldIssue;

/// Whether `ncf` looks like an electronic document number: `E`, a two-digit
/// type and 8 to 10 sequence digits.
#[must_use]
pub fn is_valid_ncf(ncf: &str) -> bool {
    let Some(digits) = ncf.strip_prefix('E') else {
        return false;
    };
    (10..=12).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Sequence part of a document number (everything after prefix and type).
fn sequence_of(ncf: &str) -> Option<u64> {
    ncf.get(3..)?.parse().ok()
}

/// One entry of an annulment request: a single number or an inclusive span.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnulmentEntry {
    /// Declared document type.
    #[serde(default)]
    pub tipo_documento: Option<String>,
    /// Single number.
    #[serde(default)]
    pub ncf: Option<String>,
    /// First number of the span.
    #[serde(default)]
    pub ncf_desde: Option<String>,
    /// Last number of the span.
    #[serde(default)]
    pub ncf_hasta: Option<String>,
}

/// Annulment request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnulmentRequest {
    /// Issuer tax ID.
    #[serde(default)]
    pub rnc: Option<String>,
    /// Entries to annul.
    #[serde(default)]
    pub anulaciones: Vec<AnnulmentEntry>,
    /// Timestamp `DD-MM-YYYY HH:mm:ss`; defaults to now.
    #[serde(default)]
    pub fecha_hora_anulacion: Option<String>,
}

/// A validated span of numbers to annul.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnulmentSpan {
    /// Document type.
    pub tipo_documento: DocumentType,
    /// First number.
    pub ncf_desde: String,
    /// Last number.
    pub ncf_hasta: String,
    /// Amount of numbers in the span.
    pub cantidad: u64,
}

/// A fully validated annulment batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnulmentBatch {
    /// Issuer tax ID.
    pub tax_id: String,
    /// Spans in request order.
    pub spans: Vec<AnnulmentSpan>,
    /// Explicit timestamp, if the caller sent one.
    pub timestamp: Option<NaiveDateTime>,
}

impl AnnulmentBatch {
    /// Total amount of numbers annulled.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.spans.iter().map(|span| span.cantidad).sum()
    }
}

fn validate_entry(
    index: usize,
    entry: &AnnulmentEntry,
    issues: &mut Vec<FieldIssue>,
) -> Option<AnnulmentSpan> {
    let field = |name: &str| format!("anulaciones[{index}].{name}");

    let declared = entry
        .tipo_documento
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let Some(declared) = declared else {
        issues.push(FieldIssue::new(field("tipoDocumento"), "is required"));
        return None;
    };
    let Ok(document_type) = declared.parse::<DocumentType>() else {
        issues.push(FieldIssue::new(
            field("tipoDocumento"),
            "must be one of 31, 32, 33, 34, 41, 43, 44, 45",
        ));
        return None;
    };

    let from = entry
        .ncf_desde
        .as_deref()
        .or(entry.ncf.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let Some(from) = from else {
        issues.push(FieldIssue::new(field("ncfDesde"), "provide 'ncf' or 'ncfDesde'"));
        return None;
    };
    let to = entry
        .ncf_hasta
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(from);

    let mut valid = true;
    for (name, ncf) in [("ncfDesde", from), ("ncfHasta", to)] {
        if !is_valid_ncf(ncf) {
            issues.push(FieldIssue::new(
                field(name),
                "must be E + two-digit type + 8 to 10 digits, e.g. E310000000098",
            ));
            valid = false;
        } else if ncf.get(1..3) != Some(document_type.as_code_str().as_str()) {
            issues.push(FieldIssue::new(
                field(name),
                format!("type prefix does not match declared type {document_type}"),
            ));
            valid = false;
        }
    }
    if !valid {
        return None;
    }

    let (Some(start), Some(end)) = (sequence_of(from), sequence_of(to)) else {
        issues.push(FieldIssue::new(field("ncfDesde"), "sequence is not numeric"));
        return None;
    };
    if end < start {
        issues.push(FieldIssue::new(
            field("ncfHasta"),
            "must be greater than or equal to ncfDesde",
        ));
        return None;
    }

    Some(AnnulmentSpan {
        tipo_documento: document_type,
        ncf_desde: from.to_string(),
        ncf_hasta: to.to_string(),
        cantidad: end - start + 1,
    })
}

impl AnnulmentRequest {
    /// Validate every entry, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the list of offending fields when anything is invalid.
    pub fn validate(&self) -> Result<AnnulmentBatch, Vec<FieldIssue>> {
        let mut issues = Vec::new();

        let tax_id = self
            .rnc
            .as_deref()
            .map(str::trim)
            .filter(|rnc| !rnc.is_empty())
            .map(str::to_string);
        if tax_id.is_none() {
            issues.push(FieldIssue::new("rnc", "is required"));
        }
        if self.anulaciones.is_empty() {
            issues.push(FieldIssue::new("anulaciones", "must contain at least one entry"));
        }

        let spans: Vec<_> = self
            .anulaciones
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| validate_entry(index, entry, &mut issues))
            .collect();

        let timestamp = match self.fecha_hora_anulacion.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                let parsed = parse_dmy_hms(text);
                if parsed.is_none() {
                    issues.push(FieldIssue::new(
                        "fechaHoraAnulacion",
                        "must be DD-MM-YYYY HH:mm:ss",
                    ));
                }
                parsed
            }
            _ => None,
        };

        match tax_id {
            Some(tax_id) if issues.is_empty() => Ok(AnnulmentBatch {
                tax_id,
                spans,
                timestamp,
            }),
            _ => Err(issues),
        }
    }
}
