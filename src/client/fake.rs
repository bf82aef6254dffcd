//! Scriptable in-process certification service for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::wire::{AnnulReply, AnnulRequest, AuthReply, DownloadReply, StatusReply, SubmitReply};
use super::{CertificationApi, TransportError};
use crate::domain::{CanonicalInvoice, DownloadFormat};

type Scripted<T> = Mutex<Result<T, TransportError>>;

#[derive(Debug)]
pub struct FakeApi {
    pub tax_id: String,
    pub auth_delay: Mutex<Duration>,
    pub auth: Scripted<AuthReply>,
    pub submit: Scripted<SubmitReply>,
    pub status: Scripted<StatusReply>,
    pub annul: Scripted<AnnulReply>,
    pub download: Scripted<DownloadReply>,
    pub auth_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub last_submit: Mutex<Option<Value>>,
    pub last_annul: Mutex<Option<Value>>,
    pub last_token: Mutex<Option<String>>,
}

pub fn auth_ok(token: &str) -> AuthReply {
    serde_json::from_value(json!({
        "codigo": 0,
        "mensaje": "Autenticado",
        "token": token,
        "fechaExpiracion": "2099-12-31T23:59:59Z"
    }))
    .unwrap()
}

pub fn submit_ok() -> SubmitReply {
    let raw = json!({
        "codigo": 0,
        "mensaje": "Documento recibido",
        "procesado": true,
        "codigoSeguridad": "AbC123",
        "fechaFirma": "15-06-2026 10:30:00",
        "xmlBase64": "PGVDRj48L2VDRj4="
    });
    let mut reply: SubmitReply = serde_json::from_value(raw.clone()).unwrap();
    reply.raw = raw;
    reply
}

pub fn status_reply(value: Value) -> StatusReply {
    serde_json::from_value(value).unwrap()
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            tax_id: "130000001".to_string(),
            auth_delay: Mutex::new(Duration::ZERO),
            auth: Mutex::new(Ok(auth_ok("tok-1"))),
            submit: Mutex::new(Ok(submit_ok())),
            status: Mutex::new(Ok(status_reply(json!({
                "codigo": 1,
                "mensaje": "Aceptado",
                "procesado": true,
                "estado": "Aceptado"
            })))),
            annul: Mutex::new(Ok(serde_json::from_value(json!({
                "codigo": 100,
                "mensaje": "Anulado",
                "procesado": true,
                "xmlBase64": "PEFORUNGLz4="
            }))
            .unwrap())),
            download: Mutex::new(Ok(serde_json::from_value(json!({
                "codigo": 130,
                "procesado": true,
                "archivo": "PGVDRi8+"
            }))
            .unwrap())),
            auth_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            last_submit: Mutex::new(None),
            last_annul: Mutex::new(None),
            last_token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CertificationApi for FakeApi {
    async fn authenticate(&self) -> Result<AuthReply, TransportError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.auth_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.auth.lock().clone()
    }

    async fn submit(&self, invoice: &CanonicalInvoice) -> Result<SubmitReply, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock() = Some(invoice.token.clone());
        *self.last_submit.lock() = Some(serde_json::to_value(invoice).unwrap());
        self.submit.lock().clone()
    }

    async fn query_status(&self, token: &str, _ncf: &str) -> Result<StatusReply, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock() = Some(token.to_string());
        self.status.lock().clone()
    }

    async fn annul(&self, request: &AnnulRequest) -> Result<AnnulReply, TransportError> {
        *self.last_annul.lock() = Some(serde_json::to_value(request).unwrap());
        self.annul.lock().clone()
    }

    async fn download(
        &self,
        token: &str,
        _tax_id: &str,
        _ncf: &str,
        _format: DownloadFormat,
    ) -> Result<DownloadReply, TransportError> {
        *self.last_token.lock() = Some(token.to_string());
        self.download.lock().clone()
    }

    fn tax_id(&self) -> &str {
        &self.tax_id
    }
}
