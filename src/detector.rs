//! Orchestration: decode, fingerprint, and answer "seen before?".

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{FingerprintRecord, Store, StoreError};
use crate::fingerprint;

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No prior record existed; this one was just created.
    Stored(FingerprintRecord),
    /// A record with this exact content hash already exists, returned
    /// unchanged. Nothing new was written.
    Duplicate(FingerprintRecord),
}

impl Detection {
    pub fn record(&self) -> &FingerprintRecord {
        match self {
            Detection::Stored(record) | Detection::Duplicate(record) => record,
        }
    }
}

/// Why a submission was rejected. Constraint conflicts never show up here:
/// the detector recovers them into a `Duplicate` outcome.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("fingerprinting failed: {0}")]
    Hash(anyhow::Error),
    #[error("storage failure: {0}")]
    Storage(StoreError),
}

pub struct DuplicateDetector<'a> {
    store: &'a Store,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Fingerprint `bytes` and either report the pre-existing record or
    /// persist a new one. Rejected submissions leave no partial rows.
    pub fn submit(
        &self,
        bytes: &[u8],
        filename: &str,
        now: DateTime<Utc>,
    ) -> Result<Detection, DetectError> {
        let decoded = image::load_from_memory(bytes)?;
        let prints = fingerprint::compute(bytes, &decoded).map_err(DetectError::Hash)?;

        if let Some(existing) = self.find(&prints.content)? {
            debug!(content_hash = %prints.content, id = existing.id, "exact duplicate");
            return Ok(Detection::Duplicate(existing));
        }

        let uploaded_at = now.to_rfc3339();
        match self
            .store
            .insert(filename, &uploaded_at, &prints.content, &prints.perceptual)
        {
            Ok(id) => {
                info!(id, content_hash = %prints.content, "stored new fingerprint");
                Ok(Detection::Stored(FingerprintRecord {
                    id,
                    filename: filename.to_string(),
                    uploaded_at,
                    content_hash: prints.content,
                    perceptual_hash: prints.perceptual,
                }))
            }
            // Another submission of identical bytes won the insert race.
            // Re-query so both callers see the same stored record.
            Err(StoreError::Constraint) => match self.find(&prints.content)? {
                Some(existing) => {
                    debug!(id = existing.id, "lost insert race, reporting duplicate");
                    Ok(Detection::Duplicate(existing))
                }
                None => Err(DetectError::Storage(StoreError::Constraint)),
            },
            Err(e) => Err(DetectError::Storage(e)),
        }
    }

    fn find(&self, content_hash: &str) -> Result<Option<FingerprintRecord>, DetectError> {
        self.store
            .find_by_content_hash(content_hash)
            .map_err(DetectError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::{tempdir, TempDir};

    fn sample_image(seed: u8) -> RgbImage {
        RgbImage::from_fn(32, 32, |x, y| Rgb([x as u8 ^ seed, y as u8, seed]))
    }

    fn encode(img: &RgbImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut buf, format)
            .unwrap();
        buf.into_inner()
    }

    fn sample_png(seed: u8) -> Vec<u8> {
        encode(&sample_image(seed), image::ImageFormat::Png)
    }

    fn open_store() -> (TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (dir, store)
    }

    #[test]
    fn stores_then_detects_duplicate() {
        let (_dir, store) = open_store();
        let detector = DuplicateDetector::new(&store);
        let bytes = sample_png(1);

        let first = detector
            .submit(&bytes, "cat.png", Utc::now())
            .unwrap();
        let stored = match first {
            Detection::Stored(record) => record,
            other => panic!("expected Stored, got {other:?}"),
        };
        assert_eq!(stored.id, 1);
        assert_eq!(stored.content_hash, fingerprint::hash_content(&bytes));
        assert_eq!(stored.perceptual_hash.len(), 16);

        // Same bytes again, later: the original record comes back untouched.
        let second = detector
            .submit(&bytes, "cat-copy.png", Utc::now())
            .unwrap();
        match second {
            Detection::Duplicate(record) => assert_eq!(record, stored),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn reencoded_pixels_are_distinct_records() {
        let (_dir, store) = open_store();
        let detector = DuplicateDetector::new(&store);

        let img = sample_image(2);
        let png = encode(&img, image::ImageFormat::Png);
        let bmp = encode(&img, image::ImageFormat::Bmp);
        assert_ne!(png, bmp);

        let a = detector.submit(&png, "a.png", Utc::now()).unwrap();
        let b = detector.submit(&bmp, "a.bmp", Utc::now()).unwrap();

        let (a, b) = match (a, b) {
            (Detection::Stored(a), Detection::Stored(b)) => (a, b),
            other => panic!("expected two Stored outcomes, got {other:?}"),
        };
        // Content hashes see the bytes; the perceptual hash sees the pixels.
        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(a.perceptual_hash, b.perceptual_hash);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn rejects_undecodable_bytes_without_writing() {
        let (_dir, store) = open_store();
        let detector = DuplicateDetector::new(&store);

        let err = detector
            .submit(b"definitely not an image", "junk.png", Utc::now())
            .unwrap_err();
        assert!(matches!(err, DetectError::Decode(_)));

        let err = detector.submit(&[], "empty.png", Utc::now()).unwrap_err();
        assert!(matches!(err, DetectError::Decode(_)));

        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn concurrent_submissions_store_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("race.db");
        let store = Store::open(&path).unwrap();
        store.initialize().unwrap();

        let bytes = sample_png(3);
        let outcomes: Vec<Detection> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let path = &path;
                    let bytes = &bytes;
                    s.spawn(move || {
                        let store = Store::open(path).unwrap();
                        let detector = DuplicateDetector::new(&store);
                        detector.submit(bytes, "race.png", Utc::now()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let stored = outcomes
            .iter()
            .filter(|d| matches!(d, Detection::Stored(_)))
            .count();
        assert_eq!(stored, 1);
        assert_eq!(outcomes.len() - stored, 7);
        assert_eq!(store.count().unwrap(), 1);

        // Every caller saw the same record regardless of race timing.
        let winner = store.list_recent(1).unwrap().remove(0);
        for outcome in &outcomes {
            assert_eq!(outcome.record().content_hash, winner.content_hash);
        }
    }
}
