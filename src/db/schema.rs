pub const SCHEMA: &str = r#"
-- Fingerprints table: one row per distinct upload, hashes only (no image bytes)
CREATE TABLE IF NOT EXISTS fingerprints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,

    -- Exact-match fingerprint: SHA-256 over the raw upload bytes.
    -- UNIQUE is the enforcement point for one-record-per-hash.
    content_hash TEXT NOT NULL UNIQUE,

    -- Perceptual fingerprint over decoded pixels. Stored, not matched on.
    perceptual_hash TEXT NOT NULL
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_fingerprints_content_hash ON fingerprints(content_hash);
CREATE INDEX IF NOT EXISTS idx_fingerprints_uploaded_at ON fingerprints(uploaded_at);
"#;
