//! DGII verification links encoded in invoice QR images.

use url::form_urlencoded::Serializer;

use crate::domain::dates::{format_dmy, parse_date};
use crate::domain::{DocumentType, Money, QrLinkRequest};
use crate::error::{AppError, FieldIssue};
use crate::service::allocator::parse_document_type;

/// Consumer invoice verification endpoint.
pub const CONSUMER_ENDPOINT: &str = "https://fc.dgii.gov.do/ecf/ConsultaTimbreFC";

/// Verification endpoint for every other type.
pub const STANDARD_ENDPOINT: &str = "https://ecf.dgii.gov.do/ecf/ConsultaTimbre";

/// Values printed in the verification link.
#[derive(Debug, Clone, Copy)]
pub struct QrInput<'a> {
    /// Document type; `None` uses the standard endpoint.
    pub document_type: Option<DocumentType>,
    /// Issuer tax ID.
    pub issuer_tax_id: &'a str,
    /// Buyer tax ID, blank when absent.
    pub buyer_tax_id: Option<&'a str>,
    /// Document number.
    pub ncf: &'a str,
    /// Issue date in any accepted format.
    pub issue_date: Option<&'a str>,
    /// Grand total.
    pub total: Money,
    /// Signature timestamp, written as received.
    pub signature_date: Option<&'a str>,
    /// Security code.
    pub security_code: &'a str,
}

/// `DD-MM-YYYY` when the text is a recognizable date, else unchanged.
fn link_date(text: &str) -> String {
    parse_date(text).map_or_else(|| text.trim().to_string(), format_dmy)
}

/// Builds verification URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrLinkBuilder;

impl QrLinkBuilder {
    /// URL for a submitted document.
    #[must_use]
    pub fn build(input: &QrInput<'_>) -> String {
        let mut query = Serializer::new(String::new());
        let endpoint = if input.document_type == Some(DocumentType::ConsumerInvoice) {
            query
                .append_pair("RncEmisor", input.issuer_tax_id)
                .append_pair("ENCF", input.ncf)
                .append_pair("MontoTotal", &input.total.to_string())
                .append_pair("CodigoSeguridad", input.security_code);
            CONSUMER_ENDPOINT
        } else {
            let issue_date = input.issue_date.map(link_date).unwrap_or_default();
            let signature_date = input
                .signature_date
                .map(str::trim)
                .filter(|date| !date.is_empty())
                .map_or_else(|| issue_date.clone(), str::to_string);
            query
                .append_pair("RncEmisor", input.issuer_tax_id)
                .append_pair("RncComprador", input.buyer_tax_id.unwrap_or_default())
                .append_pair("ENCF", input.ncf)
                .append_pair("FechaEmision", &issue_date)
                .append_pair("MontoTotal", &input.total.to_string())
                .append_pair("FechaFirma", &signature_date)
                .append_pair("CodigoSeguridad", input.security_code);
            STANDARD_ENDPOINT
        };
        format!("{endpoint}?{}", query.finish())
    }

    /// URL from loose request values; a prebuilt `url` is returned as is.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every missing value.
    pub fn build_from_parts(request: &QrLinkRequest) -> Result<String, AppError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        if let Some(url) = present(&request.url) {
            return Ok(url);
        }

        let mut issues = Vec::new();
        let issuer = present(&request.rnc);
        let ncf = present(&request.ncf);
        let code = present(&request.codigo);
        let issue_date = present(&request.fecha);
        let document_type = request.tipo.as_ref().and_then(parse_document_type);
        let consumer = document_type == Some(DocumentType::ConsumerInvoice);

        if issuer.is_none() {
            issues.push(FieldIssue::new("rnc", "is required unless url is given"));
        }
        if ncf.is_none() {
            issues.push(FieldIssue::new("ncf", "is required unless url is given"));
        }
        if code.is_none() {
            issues.push(FieldIssue::new("codigo", "security code is required"));
        }
        if !consumer && issue_date.is_none() {
            issues.push(FieldIssue::new("fecha", "issue date is required for this document type"));
        }
        let total = match request.monto.as_ref().filter(|monto| monto.as_text().is_some()) {
            None => Money::ZERO,
            Some(monto) => monto.as_amount().map_or_else(
                || {
                    issues.push(FieldIssue::new("monto", "must be a number"));
                    Money::ZERO
                },
                Money::new,
            ),
        };

        let (Some(issuer), Some(ncf), Some(code)) = (issuer, ncf, code) else {
            return Err(AppError::Validation(issues));
        };
        if !issues.is_empty() {
            return Err(AppError::Validation(issues));
        }

        let buyer = present(&request.rnc_comprador);
        let signature_date = present(&request.fecha_firma);
        Ok(Self::build(&QrInput {
            document_type,
            issuer_tax_id: &issuer,
            buyer_tax_id: buyer.as_deref(),
            ncf: &ncf,
            issue_date: issue_date.as_deref(),
            total,
            signature_date: signature_date.as_deref(),
            security_code: &code,
        }))
    }
}
