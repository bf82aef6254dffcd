//! Certification service client.
//!
//! [`CertificationApi`] is the seam between the gateway and the network:
//! the HTTP implementation talks to the real service, tests plug in fakes.

mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod wire;

use async_trait::async_trait;

pub use error::TransportError;
pub(crate) use error::truncate_body;
pub use http::HttpCertificationApi;
pub use wire::{AnnulReply, AnnulRequest, AuthReply, DownloadReply, StatusReply, SubmitReply};

use crate::domain::{CanonicalInvoice, DownloadFormat};

/// Operations offered by the certification service.
///
/// Every method performs exactly one request and never retries.
#[async_trait]
pub trait CertificationApi: Send + Sync + std::fmt::Debug {
    /// Exchange the configured credentials for a bearer token.
    async fn authenticate(&self) -> Result<AuthReply, TransportError>;

    /// Submit a document. The token travels inside the payload.
    async fn submit(&self, invoice: &CanonicalInvoice) -> Result<SubmitReply, TransportError>;

    /// Query the status of a submitted document.
    async fn query_status(&self, token: &str, ncf: &str) -> Result<StatusReply, TransportError>;

    /// Annul spans of unused numbers.
    async fn annul(&self, request: &AnnulRequest) -> Result<AnnulReply, TransportError>;

    /// Download the signed XML or the PDF of a document.
    async fn download(
        &self,
        token: &str,
        tax_id: &str,
        ncf: &str,
        format: DownloadFormat,
    ) -> Result<DownloadReply, TransportError>;

    /// Issuer tax ID the account is registered under.
    fn tax_id(&self) -> &str;
}
