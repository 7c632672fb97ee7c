//! safehash: image fingerprinting and exact re-upload detection.
//!
//! Uploads are reduced to two independent fingerprints, a SHA-256 content
//! hash over the raw bytes and a perceptual hash over the decoded pixels,
//! and only those are persisted. The store guarantees at most one record
//! per distinct content hash, so re-submitting the same bytes reports the
//! original record instead of creating a new one.

pub mod config;
pub mod db;
pub mod detector;
pub mod discovery;
pub mod export;
pub mod fingerprint;
pub mod logging;

pub use db::{FingerprintRecord, Store, StoreError};
pub use detector::{DetectError, Detection, DuplicateDetector};
