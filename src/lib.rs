//! certvault — certificate issuance and verification service for a student
//! sports society.
//!
//! The core is the bulk certificate operations engine: batch generation of
//! placeholder certificates, CSV bulk import, inline multi-row edit commit,
//! and batch-scoped undo, all recorded in an advisory batch ledger. Around
//! it sit a keyed certificate repository, an event store for the listing
//! pages, and a JSON HTTP API with token-gated admin routes.

pub mod config;
pub mod csv;
pub mod db;
pub mod error;
pub mod http;
pub mod ledger;
pub mod model;
pub mod ops;
