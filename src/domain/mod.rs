//! Domain models for the e-CF worker.
//!
//! Sequence ranges, the simplified and canonical invoice shapes, status
//! vocabulary and API contracts.

pub mod annulment;
pub mod canonical;
pub mod dates;
pub mod document_type;
pub mod dto;
pub mod invoice;
pub mod money;
pub mod sequence;
pub mod status;

pub use annulment::{AnnulmentBatch, AnnulmentEntry, AnnulmentRequest, AnnulmentSpan};
pub use canonical::{AmountSummary, CanonicalInvoice, Totals};
pub use document_type::{DocumentType, UnknownDocumentType};
pub use dto::{
    ApiResponse, ConsumeResponse, CreateRangeRequest, DownloadFormat, DownloadRequest,
    HealthResponse, NumberRequest, NumberResponse, Page, PreviewResponse, QrLinkRequest,
    QrLinkResponse, RangeListQuery, RangeStats, RangeView, ReadyComponents, ReadyResponse,
    SetStateRequest, StatusQueryRequest,
};
pub use invoice::SimplifiedInvoice;
pub use money::{MAX_AMOUNT, Money, Scalar};
pub use sequence::{
    AdminState, NewRange, RangeOutcome, RangeRejection, RangeState, RangeUpdate, SequenceRange,
};
pub use status::{NormalizedStatus, RawStatus, StatusReport};
