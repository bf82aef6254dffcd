//! Failure notifications to support staff.
//!
//! Delivery is best effort: reports are sent from a spawned task and a failed
//! send is only logged.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::client::TransportError;
use crate::client::http::classify;
use crate::config::NotificationConfig;
use crate::domain::dates::{format_dmy_hms, to_local};

/// What went wrong with a submission.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Document number, when the input carried one.
    pub ncf: Option<String>,
    /// Error code name (`UPSTREAM_TIMEOUT`, `BUSINESS_REJECTED`, ...).
    pub kind: String,
    /// Human readable message.
    pub message: String,
    /// Upstream result code.
    pub upstream_code: Option<i64>,
    /// HTTP status returned to the caller.
    pub http_status: u16,
    /// Invoice exactly as received.
    pub invoice: Value,
    /// Upstream response body, if any.
    pub upstream_response: Option<Value>,
    /// When the failure happened.
    pub occurred_at: DateTime<Utc>,
}

impl FailureReport {
    /// Email subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "Error en Envío de Factura Electrónica - {}",
            self.ncf.as_deref().unwrap_or("NCF No Disponible")
        )
    }

    /// Plain-text body.
    #[must_use]
    pub fn text_body(&self) -> String {
        let mut body = String::from("Error en Envío de Factura Electrónica\n\n");
        let _ = writeln!(body, "Fecha: {}", format_dmy_hms(to_local(self.occurred_at)));
        let _ = writeln!(body, "Tipo de Error: {}", self.kind);
        let _ = writeln!(body, "Mensaje: {}", self.message);
        let _ = writeln!(
            body,
            "Código de Error: {}",
            self.upstream_code
                .map_or_else(|| "N/A".to_string(), |code| code.to_string())
        );
        let _ = writeln!(body, "Status HTTP: {}", self.http_status);
        let _ = writeln!(body, "\nFactura Original:\n{}", pretty(&self.invoice));
        if let Some(response) = &self.upstream_response {
            let _ = writeln!(body, "\nRespuesta del servicio de certificación:\n{}", pretty(response));
        }
        body
    }

    /// HTML body with every interpolated value escaped.
    #[must_use]
    pub fn html_body(&self) -> String {
        let mut html = String::from(
            "<div style=\"font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto;\">\
             <h1>Error en Envío de Factura Electrónica</h1>",
        );
        let rows = [
            ("Fecha y Hora", format_dmy_hms(to_local(self.occurred_at))),
            ("Tipo de Error", self.kind.clone()),
            ("Mensaje", self.message.clone()),
            (
                "Código de Error",
                self.upstream_code
                    .map_or_else(|| "N/A".to_string(), |code| code.to_string()),
            ),
            ("Status HTTP", self.http_status.to_string()),
        ];
        for (label, value) in rows {
            let _ = write!(html, "<p><strong>{label}:</strong> {}</p>", escape_html(&value));
        }
        let _ = write!(
            html,
            "<h2>Factura Original (JSON)</h2><pre>{}</pre>",
            escape_html(&pretty(&self.invoice))
        );
        if let Some(response) = &self.upstream_response {
            let _ = write!(
                html,
                "<h2>Respuesta del servicio de certificación</h2><pre>{}</pre>",
                escape_html(&pretty(response))
            );
        }
        html.push_str("</div>");
        html
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Delivers failure reports.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver one report.
    async fn notify_failure(&self, report: &FailureReport) -> Result<(), TransportError>;
}

/// Writes reports to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_failure(&self, report: &FailureReport) -> Result<(), TransportError> {
        warn!(
            ncf = report.ncf.as_deref().unwrap_or("-"),
            kind = %report.kind,
            message = %report.message,
            upstream_code = ?report.upstream_code,
            "Invoice submission failed"
        );
        Ok(())
    }
}

/// Sends reports through the Brevo transactional email API.
#[derive(Debug, Clone)]
pub struct BrevoNotifier {
    client: reqwest::Client,
    config: NotificationConfig,
}

impl BrevoNotifier {
    /// Create a notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: NotificationConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn payload(&self, report: &FailureReport) -> Value {
        json!({
            "sender": {
                "name": self.config.sender_name,
                "email": self.config.sender_email,
            },
            "to": [{"email": self.config.support_email}],
            "subject": report.subject(),
            "htmlContent": report.html_body(),
            "textContent": report.text_body(),
        })
    }
}

#[async_trait]
impl Notifier for BrevoNotifier {
    async fn notify_failure(&self, report: &FailureReport) -> Result<(), TransportError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let resp = self
            .client
            .post(&self.config.brevo_url)
            .header("api-key", &self.config.brevo_api_key)
            .header("accept", "application/json")
            .json(&self.payload(report))
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: crate::client::truncate_body(&body),
            });
        }
        info!(to = %self.config.support_email, subject = %report.subject(), "Failure report sent");
        Ok(())
    }
}

/// Brevo when enabled and configured, log-only otherwise.
pub fn create_notifier(config: &NotificationConfig) -> Arc<dyn Notifier> {
    if !config.enabled {
        return Arc::new(LogNotifier);
    }
    if config.brevo_api_key.trim().is_empty() {
        warn!("Notifications enabled without a Brevo API key, logging failures only");
        return Arc::new(LogNotifier);
    }
    match BrevoNotifier::new(config.clone()) {
        Ok(notifier) => Arc::new(notifier),
        Err(err) => {
            warn!(error = %err, "Could not build Brevo client, logging failures only");
            Arc::new(LogNotifier)
        }
    }
}

/// Send `report` in the background.
pub fn spawn_report(notifier: Arc<dyn Notifier>, report: FailureReport) {
    tokio::spawn(async move {
        match notifier.notify_failure(&report).await {
            Ok(()) => {
                metrics::counter!("ecf_failure_notifications_total", "outcome" => "sent")
                    .increment(1);
            }
            Err(err) => {
                metrics::counter!("ecf_failure_notifications_total", "outcome" => "failed")
                    .increment(1);
                error!(error = %err, ncf = report.ncf.as_deref().unwrap_or("-"), "Failure report not delivered");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    use super::*;

    fn report() -> FailureReport {
        FailureReport {
            ncf: Some("E310000000007".to_string()),
            kind: "BUSINESS_REJECTED".to_string(),
            message: "Monto <inválido>".to_string(),
            upstream_code: Some(111),
            http_status: 422,
            invoice: json!({"factura": {"ncf": "E310000000007"}}),
            upstream_response: Some(json!({"codigo": 111})),
            occurred_at: Utc.with_ymd_and_hms(2026, 6, 15, 14, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_bodies_are_escaped_and_localized() {
        let report = report();
        assert_eq!(
            report.subject(),
            "Error en Envío de Factura Electrónica - E310000000007"
        );
        let html = report.html_body();
        assert!(html.contains("Monto &lt;inválido&gt;"));
        assert!(html.contains("15-06-2026 10:00:00"));
        assert!(!html.contains("<inválido>"));
        assert!(report.text_body().contains("Código de Error: 111"));
    }

    #[test]
    fn test_subject_without_number() {
        let mut report = report();
        report.ncf = None;
        assert!(report.subject().ends_with("NCF No Disponible"));
    }

    #[test]
    fn test_disabled_config_logs_only() {
        let notifier = create_notifier(&NotificationConfig::default());
        assert!(format!("{notifier:?}").contains("LogNotifier"));
    }

    #[tokio::test]
    async fn test_brevo_request_shape() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/v3/smtp/email",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    let key = headers
                        .get("api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock() = Some((key, body));
                    Json(json!({"messageId": "1"}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = NotificationConfig {
            enabled: true,
            brevo_api_key: "secret".to_string(),
            brevo_url: format!("http://{addr}/v3/smtp/email"),
            ..NotificationConfig::default()
        };
        let notifier = BrevoNotifier::new(config.clone()).unwrap();
        notifier.notify_failure(&report()).await.unwrap();

        let (key, body) = seen.lock().take().unwrap();
        assert_eq!(key, "secret");
        assert_eq!(body["to"][0]["email"], config.support_email);
        assert_eq!(body["sender"]["email"], config.sender_email);
        assert!(body["subject"].as_str().unwrap().ends_with("E310000000007"));
    }

    #[tokio::test]
    async fn test_brevo_error_status() {
        let app = Router::new().route(
            "/v3/smtp/email",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "bad sender") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let notifier = BrevoNotifier::new(NotificationConfig {
            brevo_url: format!("http://{addr}/v3/smtp/email"),
            ..NotificationConfig::default()
        })
        .unwrap();
        let err = notifier.notify_failure(&report()).await.unwrap_err();
        assert!(matches!(err, TransportError::Http { status: 400, .. }));
    }
}
