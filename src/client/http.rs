//! reqwest implementation of [`CertificationApi`].

use std::error::Error as _;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::error::truncate_body;
use super::wire::{
    AnnulReply, AnnulRequest, AuthReply, AuthRequest, DownloadFileRequest, DownloadReply,
    StatusReply, StatusRequest, SubmitReply,
};
use super::{CertificationApi, TransportError};
use crate::config::CertificationConfig;
use crate::domain::{CanonicalInvoice, DownloadFormat};

/// Certification service over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpCertificationApi {
    client: reqwest::Client,
    config: CertificationConfig,
}

impl HttpCertificationApi {
    /// Create a client for the configured service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CertificationConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn post<B, R>(&self, path: &str, body: &B, timeout_secs: u64) -> Result<R, TransportError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let value = self.post_value(path, body, timeout_secs).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn post_value<B>(
        &self,
        path: &str,
        body: &B,
        timeout_secs: u64,
    ) -> Result<serde_json::Value, TransportError>
    where
        B: Serialize + Sync,
    {
        let timeout = Duration::from_secs(timeout_secs);
        let url = self.config.url(path);
        debug!(url = %url, timeout_secs, "Calling certification service");

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| classify(&e, timeout))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Map a reqwest failure to the transport taxonomy.
pub(crate) fn classify(err: &reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                ErrorKind::ConnectionRefused => return TransportError::Refused(err.to_string()),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                    return TransportError::Reset(err.to_string());
                }
                ErrorKind::TimedOut => return TransportError::Timeout(timeout),
                _ => {}
            }
        }
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup") {
            return TransportError::Dns(err.to_string());
        }
        source = cause.source();
    }

    if err.is_connect() {
        TransportError::Refused(err.to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl CertificationApi for HttpCertificationApi {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<AuthReply, TransportError> {
        let body = AuthRequest {
            usuario: &self.config.username,
            clave: &self.config.password,
            rnc: &self.config.tax_id,
        };
        self.post(
            &self.config.paths.auth,
            &body,
            self.config.timeouts.auth_secs,
        )
        .await
    }

    #[instrument(skip_all, fields(ncf = %invoice.document.header.identification.ncf))]
    async fn submit(&self, invoice: &CanonicalInvoice) -> Result<SubmitReply, TransportError> {
        let raw = self
            .post_value(
                &self.config.paths.submit,
                invoice,
                self.config.timeouts.submit_secs,
            )
            .await?;
        let mut reply: SubmitReply = serde_json::from_value(raw.clone())
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        reply.raw = raw;
        Ok(reply)
    }

    #[instrument(skip(self, token))]
    async fn query_status(&self, token: &str, ncf: &str) -> Result<StatusReply, TransportError> {
        let body = StatusRequest {
            token,
            rnc: &self.config.tax_id,
            documento: ncf,
        };
        self.post(
            &self.config.paths.status,
            &body,
            self.config.timeouts.status_secs,
        )
        .await
    }

    #[instrument(skip_all)]
    async fn annul(&self, request: &AnnulRequest) -> Result<AnnulReply, TransportError> {
        self.post(
            &self.config.paths.annul,
            request,
            self.config.timeouts.annul_secs,
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn download(
        &self,
        token: &str,
        tax_id: &str,
        ncf: &str,
        format: DownloadFormat,
    ) -> Result<DownloadReply, TransportError> {
        let body = DownloadFileRequest {
            token,
            rnc: tax_id,
            documento: ncf,
            extension: format.extension(),
        };
        self.post(
            &self.config.paths.download,
            &body,
            self.config.timeouts.download_secs,
        )
        .await
    }

    fn tax_id(&self) -> &str {
        &self.config.tax_id
    }
}
