//! Cache filenames derived from the CRC-32 (IEEE) of a URL.

/// Cache key for a URL: the checksum as 8 lowercase hex digits.
pub fn cache_key(url: &str) -> String {
    format!("{:08x}", crc32fast::hash(url.as_bytes()))
}
