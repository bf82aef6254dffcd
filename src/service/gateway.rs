//! Certification gateway.
//!
//! Orchestrates every call to the certification service: token handling,
//! payload transformation, result interpretation and failure reporting.
//! Nothing here retries; callers decide based on the error returned.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::client::wire::{AnnulBody, AnnulDetail, AnnulHeader, AnnulledSequence};
use crate::client::{AnnulRequest, CertificationApi, StatusReply, TransportError};
use crate::config::CertificationConfig;
use crate::domain::dates::{format_dmy_hms, to_local};
use crate::domain::{
    AnnulmentRequest, AnnulmentSpan, CanonicalInvoice, DocumentType, DownloadFormat,
    DownloadRequest, NormalizedStatus, RawStatus, SimplifiedInvoice, StatusReport,
};
use crate::error::{AppError, FieldIssue};
use crate::service::clock::Clock;
use crate::service::notify::{FailureReport, Notifier, spawn_report};
use crate::service::qr::{QrInput, QrLinkBuilder};
use crate::service::status::normalize;
use crate::service::token_cache::AuthTokenCache;
use crate::service::transform::DocumentTransformer;

const NOT_FOUND_ADVISORY: &str = "El documento no se encuentra en el servicio de certificación. \
     Posibles causas: 1) el documento nunca fue enviado, 2) diferencia de ambiente (demo o producción), \
     3) RNC incorrecto en la consulta, 4) demora en la sincronización.";

/// Friendly text for well-known rejection codes.
fn friendly_rejection(code: i64) -> Option<&'static str> {
    match code {
        108 => Some("NCF ya fue presentado anteriormente"),
        109 => Some("NCF vencido o inválido"),
        110 => Some("RNC no autorizado para este tipo de comprobante"),
        111 => Some("Datos de la factura inválidos"),
        _ => None,
    }
}

/// Whether an upstream message says our token is no longer accepted.
fn mentions_bad_token(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("token")
        && (lower.contains("expir") || lower.contains("invalid") || lower.contains("inválid"))
}

/// Stable name of a failure, used in reports and metrics.
const fn failure_kind(error: &AppError) -> &'static str {
    match error {
        AppError::TokenExpired => "TOKEN_EXPIRED",
        AppError::AuthenticationRejected(_) => "AUTHENTICATION_REJECTED",
        AppError::Business { .. } => "BUSINESS_REJECTED",
        AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
        AppError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
        AppError::Upstream(_) => "UPSTREAM_ERROR",
        AppError::Validation(_) | AppError::BadRequest(_) => "VALIDATION_FAILED",
        _ => "INTERNAL_ERROR",
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    /// Submitted document number.
    pub ncf: String,
    /// Security code printed on the invoice.
    pub security_code: Option<String>,
    /// Signature timestamp.
    pub signature_date: Option<String>,
    /// Signed document, base64.
    pub xml_base64: Option<String>,
    /// Verification URL for the QR image.
    pub qr_url: String,
    /// Status right after submission; absent when the query failed.
    pub initial_status: Option<StatusReport>,
    /// Total written in the document.
    pub total: String,
    /// Full upstream response.
    pub upstream_response: Value,
}

/// Outcome of an annulment batch.
#[derive(Debug, Clone, Serialize)]
pub struct AnnulmentResult {
    /// Issuer tax ID.
    pub tax_id: String,
    /// Numbers annulled.
    pub total: u64,
    /// Spans in request order.
    pub spans: Vec<AnnulmentSpan>,
    /// Timestamp sent upstream.
    pub timestamp: String,
    /// Upstream message.
    pub message: Option<String>,
    /// Signed annulment, base64.
    pub xml_base64: Option<String>,
}

/// A downloaded certified file.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Document number.
    pub ncf: String,
    /// File format.
    pub format: DownloadFormat,
    /// Decoded contents.
    pub contents: Bytes,
}

/// Reachability of the certification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpstreamState {
    /// Authentication succeeded.
    #[serde(rename = "FUNCIONANDO")]
    Operational,
    /// No answer, or no answer in time.
    #[serde(rename = "SERVIDOR_CAIDO")]
    Unreachable,
    /// The service answered but refused the credentials.
    #[serde(rename = "AUTENTICACION_FALLIDA")]
    AuthenticationFailed,
}

/// Result of probing the certification service.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamProbe {
    /// Classification.
    pub state: UpstreamState,
    /// What happened.
    pub detail: String,
    /// What an operator should do.
    pub recommendation: &'static str,
    /// Round-trip time of the probe.
    pub latency_ms: u64,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
}

/// Gateway to the certification service.
#[derive(Debug)]
pub struct CertificationGateway {
    api: Arc<dyn CertificationApi>,
    tokens: AuthTokenCache,
    transformer: DocumentTransformer,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl CertificationGateway {
    /// Create a gateway with an empty token cache.
    pub fn new(
        api: Arc<dyn CertificationApi>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: &CertificationConfig,
    ) -> Self {
        Self {
            tokens: AuthTokenCache::new(Arc::clone(&api), Arc::clone(&clock), config),
            transformer: DocumentTransformer::new(Arc::clone(&clock)),
            api,
            notifier,
            clock,
        }
    }

    async fn token(&self) -> Result<String, AppError> {
        self.tokens.get_token().await.map_err(AppError::from)
    }

    /// Map a transport failure, dropping the token when it was refused.
    fn transport_failure(&self, err: TransportError) -> AppError {
        if err.is_auth_rejection() {
            self.tokens.invalidate();
        }
        err.into()
    }

    /// Map an unsuccessful reply.
    fn rejection(&self, code: Option<i64>, message: Option<&str>) -> AppError {
        if message.is_some_and(mentions_bad_token) {
            self.tokens.invalidate();
            return AppError::TokenExpired;
        }
        let message = code
            .and_then(friendly_rejection)
            .or(message)
            .unwrap_or("Error desconocido")
            .to_string();
        AppError::Business {
            code: code.unwrap_or(-1),
            message,
        }
    }

    /// Transform and submit an invoice given as received.
    ///
    /// # Errors
    ///
    /// Validation problems, token failures, transport failures and business
    /// rejections. Every failure except validation is reported to support.
    #[instrument(skip_all, fields(ncf = tracing::field::Empty))]
    pub async fn submit(&self, body: Value) -> Result<SubmissionResult, AppError> {
        let invoice: SimplifiedInvoice = serde_json::from_value(body.clone())
            .map_err(|e| AppError::BadRequest(format!("invalid invoice: {e}")))?;
        let mut canonical = self.transformer.transform(&invoice, "")?;
        let ncf = canonical.document.header.identification.ncf.clone();
        tracing::Span::current().record("ncf", ncf.as_str());

        match self.submit_canonical(&mut canonical).await {
            Ok(result) => {
                metrics::counter!("ecf_submissions_total", "outcome" => "accepted").increment(1);
                info!(ncf = %ncf, total = %result.total, "Invoice certified");
                Ok(result)
            }
            Err((error, upstream_response)) => {
                let kind = failure_kind(&error);
                metrics::counter!("ecf_submissions_total", "outcome" => kind).increment(1);
                warn!(ncf = %ncf, kind, error = %error, "Invoice submission failed");
                let upstream_code = match &error {
                    AppError::Business { code, .. } => Some(*code),
                    _ => None,
                };
                spawn_report(
                    Arc::clone(&self.notifier),
                    FailureReport {
                        ncf: Some(ncf),
                        kind: kind.to_string(),
                        message: error.to_string(),
                        upstream_code,
                        http_status: error.status_code().as_u16(),
                        invoice: body,
                        upstream_response,
                        occurred_at: self.clock.now(),
                    },
                );
                Err(error)
            }
        }
    }

    async fn submit_canonical(
        &self,
        canonical: &mut CanonicalInvoice,
    ) -> Result<SubmissionResult, (AppError, Option<Value>)> {
        canonical.token = self.token().await.map_err(|e| (e, None))?;
        let reply = self
            .api
            .submit(canonical)
            .await
            .map_err(|e| (self.transport_failure(e), None))?;
        if !reply.is_success() {
            let error = self.rejection(reply.codigo, reply.mensaje.as_deref());
            return Err((error, Some(reply.raw)));
        }

        let header = &canonical.document.header;
        let ncf = header.identification.ncf.clone();
        let initial_status = match self.status_report(&ncf).await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(ncf = %ncf, error = %err, "Status query after submission failed");
                None
            }
        };

        let security_code = reply.codigo_seguridad.clone();
        let signature_date = reply.fecha_firma.clone().or_else(|| reply.fecha_emision.clone());
        let total = canonical.summary.reported_total;
        let qr_url = QrLinkBuilder::build(&QrInput {
            document_type: header.identification.tipo_documento.parse::<DocumentType>().ok(),
            issuer_tax_id: header.issuer.rnc.as_deref().unwrap_or_default(),
            buyer_tax_id: header.buyer.as_ref().and_then(|buyer| buyer.rnc.as_deref()),
            ncf: &ncf,
            issue_date: reply
                .fecha_emision
                .as_deref()
                .or(Some(header.issuer.fecha_emision.as_str())),
            total,
            signature_date: signature_date.as_deref(),
            security_code: security_code.as_deref().unwrap_or_default(),
        });

        Ok(SubmissionResult {
            ncf,
            security_code,
            signature_date,
            xml_base64: reply.xml_base64.clone(),
            qr_url,
            initial_status,
            total: total.to_string(),
            upstream_response: reply.raw,
        })
    }

    /// Raw upstream status of a document.
    ///
    /// # Errors
    ///
    /// Token and transport failures.
    pub async fn query_status(&self, ncf: &str) -> Result<StatusReply, AppError> {
        let token = self.token().await?;
        let reply = self
            .api
            .query_status(&token, ncf)
            .await
            .map_err(|e| self.transport_failure(e))?;
        if !reply.procesado && reply.mensaje.as_deref().is_some_and(mentions_bad_token) {
            self.tokens.invalidate();
            return Err(AppError::TokenExpired);
        }
        Ok(reply)
    }

    /// Normalized status of a document.
    ///
    /// # Errors
    ///
    /// A blank number, token and transport failures.
    pub async fn status_report(&self, ncf: &str) -> Result<StatusReport, AppError> {
        let ncf = ncf.trim();
        if ncf.is_empty() {
            return Err(AppError::Validation(vec![FieldIssue::new("ncf", "is required")]));
        }
        let reply = self.query_status(ncf).await?;

        let status = normalize(&RawStatus::from(&reply));
        let advisory = (status == NormalizedStatus::NotFound || reply.codigo == Some(120))
            .then(|| NOT_FOUND_ADVISORY.to_string());
        Ok(StatusReport {
            ncf: ncf.to_string(),
            status,
            raw_status: reply.status_text().unwrap_or("DESCONOCIDO").to_string(),
            message: reply
                .mensaje
                .clone()
                .or_else(|| reply.description.clone())
                .unwrap_or_else(|| "Sin mensaje".to_string()),
            advisory,
            queried_at: self.clock.now(),
            raw: reply.to_value(),
        })
    }

    /// Annul spans of unused numbers in one batch.
    ///
    /// # Errors
    ///
    /// Validation problems, token and transport failures, or a rejection.
    pub async fn annul(&self, request: &AnnulmentRequest) -> Result<AnnulmentResult, AppError> {
        let batch = request.validate().map_err(AppError::Validation)?;
        let timestamp = format_dmy_hms(
            batch
                .timestamp
                .unwrap_or_else(|| to_local(self.clock.now())),
        );

        let details = batch
            .spans
            .iter()
            .enumerate()
            .map(|(index, span)| AnnulDetail {
                numero_linea: (index + 1).to_string(),
                tipo_documento: span.tipo_documento.as_code_str(),
                tabla_secuencias_anuladas: vec![AnnulledSequence {
                    desde: span.ncf_desde.clone(),
                    hasta: span.ncf_hasta.clone(),
                }],
                cantidad: format!("{:02}", span.cantidad),
            })
            .collect();
        let body = AnnulRequest {
            token: self.token().await?,
            anulacion: AnnulBody {
                encabezado: AnnulHeader {
                    rnc: batch.tax_id.clone(),
                    cantidad: format!("{:02}", batch.total()),
                    fecha_hora: timestamp.clone(),
                },
                detalles: details,
            },
        };

        let reply = self
            .api
            .annul(&body)
            .await
            .map_err(|e| self.transport_failure(e))?;
        if !reply.is_success() {
            return Err(self.rejection(reply.codigo, reply.mensaje.as_deref()));
        }

        metrics::counter!("ecf_annulled_numbers_total").increment(batch.total());
        info!(tax_id = %batch.tax_id, total = batch.total(), "Numbers annulled");
        Ok(AnnulmentResult {
            total: batch.total(),
            tax_id: batch.tax_id,
            spans: batch.spans,
            timestamp,
            message: reply.mensaje,
            xml_base64: reply.xml_base64,
        })
    }

    /// Download the signed XML or the PDF of a certified document.
    ///
    /// # Errors
    ///
    /// Token and transport failures, a rejection, or an undecodable file.
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile, AppError> {
        let ncf = request.ncf.trim();
        if ncf.is_empty() {
            return Err(AppError::Validation(vec![FieldIssue::new("documento", "is required")]));
        }
        let tax_id = request
            .rnc
            .as_deref()
            .map(str::trim)
            .filter(|rnc| !rnc.is_empty())
            .unwrap_or_else(|| self.api.tax_id())
            .to_string();

        let token = self.token().await?;
        let reply = self
            .api
            .download(&token, &tax_id, ncf, request.format)
            .await
            .map_err(|e| self.transport_failure(e))?;
        if !reply.is_success() {
            return Err(self.rejection(reply.codigo, reply.mensaje.as_deref()));
        }

        let encoded = reply
            .archivo
            .ok_or_else(|| AppError::Upstream("download reply carried no file".to_string()))?;
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Upstream(format!("downloaded file is not valid base64: {e}")))?;
        Ok(DownloadedFile {
            ncf: ncf.to_string(),
            format: request.format,
            contents: Bytes::from(decoded),
        })
    }

    /// Authenticate from scratch and classify the outcome.
    ///
    /// The cached token is left untouched.
    pub async fn probe_upstream(&self) -> UpstreamProbe {
        let started = Instant::now();
        let outcome = self.api.authenticate().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (state, detail, recommendation) = match outcome {
            Ok(reply) if reply.is_success() => (
                UpstreamState::Operational,
                "Autenticación exitosa".to_string(),
                "El servicio de certificación está operativo",
            ),
            Ok(reply) => (
                UpstreamState::AuthenticationFailed,
                reply
                    .mensaje
                    .unwrap_or_else(|| "credenciales rechazadas".to_string()),
                "Verifique usuario, clave y RNC configurados",
            ),
            Err(err) if err.is_auth_rejection() => (
                UpstreamState::AuthenticationFailed,
                err.to_string(),
                "Verifique usuario, clave y RNC configurados",
            ),
            Err(err) => (
                UpstreamState::Unreachable,
                err.to_string(),
                "El servicio de certificación no responde; reintente más tarde o contacte al proveedor",
            ),
        };
        UpstreamProbe {
            state,
            detail,
            recommendation,
            latency_ms,
            checked_at: self.clock.now(),
        }
    }

    /// Drop the cached token.
    pub fn reset_token(&self) {
        self.tokens.invalidate();
    }

    /// Expiration of the cached token, if any.
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.expires_at()
    }
}
