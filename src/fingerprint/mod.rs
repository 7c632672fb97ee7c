//! The two independent fingerprints computed for every upload.

pub mod content;
pub mod perceptual;

use anyhow::Result;
use image::DynamicImage;

pub use content::hash_content;
pub use perceptual::hash_perceptual;

#[derive(Debug, Clone)]
pub struct Fingerprints {
    /// Exact-match fingerprint over the raw bytes.
    pub content: String,
    /// Approximate-match fingerprint over the decoded pixels.
    pub perceptual: String,
}

/// Compute both fingerprints for one upload. The content hash covers the
/// raw bytes as received; the perceptual hash covers the decoded pixels.
pub fn compute(bytes: &[u8], decoded: &DynamicImage) -> Result<Fingerprints> {
    Ok(Fingerprints {
        content: hash_content(bytes),
        perceptual: hash_perceptual(decoded)?,
    })
}
