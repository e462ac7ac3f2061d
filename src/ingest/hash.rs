//! Content fingerprints for corpus files.

/// MD5 hex digest of `content` with CRLF line endings normalised to LF.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    format!("{:x}", md5::compute(normalized.as_bytes()))
}
