//! Service layer module.
//!
//! Number allocation, invoice transformation and everything that talks to
//! the certification service.

pub mod allocator;
pub mod clock;
pub mod gateway;
pub mod notify;
pub mod qr;
pub mod status;
pub mod token_cache;
pub mod transform;

pub use allocator::AllocatorService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use gateway::{
    AnnulmentResult, CertificationGateway, DownloadedFile, SubmissionResult, UpstreamProbe,
    UpstreamState,
};
pub use notify::{BrevoNotifier, FailureReport, LogNotifier, Notifier, create_notifier};
pub use qr::QrLinkBuilder;
pub use token_cache::AuthTokenCache;
pub use transform::DocumentTransformer;
