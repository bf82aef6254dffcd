//! Request handlers.

pub mod certification;
pub mod health;
pub mod invoices;
pub mod numbers;
pub mod ranges;
