//! Status normalization.
//!
//! Upstream reports status through a result code, a processed flag and free
//! text, not always consistently. Codes win over text when the document is
//! processed; otherwise text is tried before falling back to the code alone.

use tracing::warn;

use crate::client::StatusReply;
use crate::domain::{NormalizedStatus, RawStatus};

impl From<&StatusReply> for RawStatus {
    fn from(reply: &StatusReply) -> Self {
        Self {
            code: reply.codigo,
            processed: reply.procesado,
            text: reply.status_text().map(str::to_string),
        }
    }
}

/// Status for a result code above 1.
fn from_code(code: i64) -> NormalizedStatus {
    match code {
        0 | 1 => NormalizedStatus::Approved,
        2 | 4 | 10 | 15 | 95 | 99 => NormalizedStatus::InProgress,
        108 => NormalizedStatus::InvalidNcf,
        109 => NormalizedStatus::ExpiredNcf,
        110 => NormalizedStatus::UnauthorizedTaxId,
        111..=114 => NormalizedStatus::InvalidData,
        120 => NormalizedStatus::NotFound,
        200..=203 | 613 | 634 => NormalizedStatus::Rejected,
        300 | 301 => NormalizedStatus::Voided,
        other => {
            warn!(code = other, "Unmapped certification status code");
            NormalizedStatus::Error
        }
    }
}

fn from_text(text: &str) -> Option<NormalizedStatus> {
    let upper = text.trim().to_uppercase();
    let has = |needle: &str| upper.contains(needle);
    let any = |needles: &[&str]| needles.iter().any(|needle| upper.contains(needle));

    if any(&["APROBADA", "ACEPTADA", "ACEPTADO", "PROCESADA", "EXITOSA", "SUCCESS"])
        || upper == "OK"
    {
        Some(NormalizedStatus::Approved)
    } else if any(&["PROCESO", "PROCESANDO", "VALIDANDO", "PENDING"]) {
        Some(NormalizedStatus::InProgress)
    } else if has("NCF") && any(&["INVALIDO", "USADO"]) {
        Some(NormalizedStatus::InvalidNcf)
    } else if has("RNC") && has("NO_AUTORIZADO") {
        Some(NormalizedStatus::UnauthorizedTaxId)
    } else if any(&["RECHAZADA", "ERROR", "FAILED", "INVALID"]) {
        Some(NormalizedStatus::Rejected)
    } else if any(&["ANULADA", "CANCELADA", "CANCELLED"]) {
        Some(NormalizedStatus::Voided)
    } else {
        None
    }
}

/// Map raw upstream status to the canonical vocabulary.
#[must_use]
pub fn normalize(raw: &RawStatus) -> NormalizedStatus {
    if raw.processed {
        match raw.code {
            Some(0 | 1) => return NormalizedStatus::Approved,
            Some(code) if code > 1 => return from_code(code),
            _ => {}
        }
    }
    if let Some(status) = raw.text.as_deref().and_then(from_text) {
        return status;
    }
    raw.code.map_or(NormalizedStatus::Unknown, from_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: Option<i64>, processed: bool, text: Option<&str>) -> RawStatus {
        RawStatus {
            code,
            processed,
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn test_processed_codes_take_priority() {
        assert_eq!(
            normalize(&raw(Some(1), true, Some("Rechazada"))),
            NormalizedStatus::Approved
        );
        assert_eq!(
            normalize(&raw(Some(109), true, Some("Aceptado"))),
            NormalizedStatus::ExpiredNcf
        );
        assert_eq!(normalize(&raw(Some(95), true, None)), NormalizedStatus::InProgress);
        assert_eq!(normalize(&raw(Some(113), true, None)), NormalizedStatus::InvalidData);
        assert_eq!(normalize(&raw(Some(634), true, None)), NormalizedStatus::Rejected);
        assert_eq!(normalize(&raw(Some(301), true, None)), NormalizedStatus::Voided);
        assert_eq!(normalize(&raw(Some(777), true, None)), NormalizedStatus::Error);
    }

    #[test]
    fn test_text_when_not_processed() {
        let cases = [
            ("Aceptado Condicional", NormalizedStatus::Approved),
            ("ok", NormalizedStatus::Approved),
            ("En proceso", NormalizedStatus::InProgress),
            ("NCF ya usado", NormalizedStatus::InvalidNcf),
            ("RNC NO_AUTORIZADO", NormalizedStatus::UnauthorizedTaxId),
            ("Failed", NormalizedStatus::Rejected),
            ("Cancelada", NormalizedStatus::Voided),
        ];
        for (text, expected) in cases {
            assert_eq!(normalize(&raw(Some(2), false, Some(text))), expected, "{text}");
        }
    }

    #[test]
    fn test_code_fallback_and_unknown() {
        assert_eq!(normalize(&raw(Some(0), false, None)), NormalizedStatus::Approved);
        assert_eq!(
            normalize(&raw(Some(120), false, Some("sin datos"))),
            NormalizedStatus::NotFound
        );
        assert_eq!(normalize(&raw(None, false, Some("???"))), NormalizedStatus::Unknown);
        assert_eq!(normalize(&raw(None, true, None)), NormalizedStatus::Unknown);
    }

    #[test]
    fn test_raw_status_from_reply() {
        let reply: StatusReply = serde_json::from_value(serde_json::json!({
            "codigo": "1",
            "procesado": true,
            "mensaje": "Aceptado"
        }))
        .unwrap();
        let raw = RawStatus::from(&reply);
        assert_eq!(raw.code, Some(1));
        assert_eq!(raw.text.as_deref(), Some("Aceptado"));
        assert_eq!(normalize(&raw), NormalizedStatus::Approved);
    }
}
