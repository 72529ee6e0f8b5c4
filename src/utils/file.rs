//! File utilities for document ingestion.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Read file content with a size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum("hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, calculate_checksum("hello world"));
        assert_ne!(checksum, calculate_checksum("hello worlds"));
    }
}
