use digest::Digest;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumType {
    /// Guess the digest family from a published checksum file name.
    pub fn from_digest_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".sha512") || lower.contains("sha512") {
            ChecksumType::Sha512
        } else if lower.ends_with(".sha1") || lower.contains("sha1sum") {
            ChecksumType::Sha1
        } else {
            ChecksumType::Sha256
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            ChecksumType::Sha1 => 40,
            ChecksumType::Sha256 => 64,
            ChecksumType::Sha512 => 128,
        }
    }
}

pub struct ChecksumVerifier;

impl ChecksumVerifier {
    pub async fn calculate_checksum(
        file_path: &Path,
        checksum_type: ChecksumType,
    ) -> Result<String, ProvisionError> {
        match checksum_type {
            ChecksumType::Sha1 => hash_file::<sha1::Sha1>(file_path).await,
            ChecksumType::Sha256 => hash_file::<sha2::Sha256>(file_path).await,
            ChecksumType::Sha512 => hash_file::<sha2::Sha512>(file_path).await,
        }
    }

    /// Find the digest for `asset` in a `sha256sum`-style listing.
    ///
    /// Accepts `<hex>  <name>` lines (optionally `*name`) or a body that is
    /// just the digest.
    pub fn parse_published(
        listing: &str,
        asset: &str,
        checksum_type: ChecksumType,
    ) -> Option<String> {
        let is_digest = |token: &str| {
            token.len() == checksum_type.hex_len() && token.chars().all(|c| c.is_ascii_hexdigit())
        };

        let mut lone = None;
        for line in listing.lines() {
            let mut parts = line.split_whitespace();
            let Some(first) = parts.next() else {
                continue;
            };
            if !is_digest(first) {
                continue;
            }
            match parts.next() {
                Some(name) if name.trim_start_matches('*') == asset => {
                    return Some(first.to_lowercase());
                }
                Some(_) => {}
                None => lone = lone.or_else(|| Some(first.to_lowercase())),
            }
        }
        lone
    }
}

async fn hash_file<D: Digest>(file_path: &Path) -> Result<String, ProvisionError> {
    let file = File::open(file_path)
        .await
        .map_err(|e| ProvisionError::io(format!("Failed to open file: {:?}", file_path), e))?;

    let mut reader = BufReader::new(file);
    let mut buffer = [0; 8192];
    let mut hasher = D::new();

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| ProvisionError::io(format!("Failed to read {:?}", file_path), e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hashes_file_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        tokio_test::block_on(async {
            let digest = ChecksumVerifier::calculate_checksum(&path, ChecksumType::Sha256)
                .await
                .unwrap();
            assert_eq!(digest, HELLO_SHA256);

            let sha1 = ChecksumVerifier::calculate_checksum(&path, ChecksumType::Sha1)
                .await
                .unwrap();
            assert_eq!(sha1, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        });
    }

    #[test]
    fn picks_line_for_asset() {
        let listing = format!(
            "{}  other.zip\n{} *ffmpeg-win64.zip\n",
            "a".repeat(64),
            HELLO_SHA256
        );
        assert_eq!(
            ChecksumVerifier::parse_published(&listing, "ffmpeg-win64.zip", ChecksumType::Sha256),
            Some(HELLO_SHA256.to_string())
        );
        assert_eq!(
            ChecksumVerifier::parse_published(&listing, "missing.zip", ChecksumType::Sha256),
            None
        );
    }

    #[test]
    fn accepts_bare_digest() {
        let body = format!("{}\n", HELLO_SHA256.to_uppercase());
        assert_eq!(
            ChecksumVerifier::parse_published(&body, "anything.zip", ChecksumType::Sha256),
            Some(HELLO_SHA256.to_string())
        );
    }

    #[test]
    fn detects_digest_family() {
        assert_eq!(
            ChecksumType::from_digest_url("https://x/checksums.sha256"),
            ChecksumType::Sha256
        );
        assert_eq!(
            ChecksumType::from_digest_url("https://x/ffmpeg.zip.sha512"),
            ChecksumType::Sha512
        );
        assert_eq!(
            ChecksumType::from_digest_url("https://x/f.zip.sha1"),
            ChecksumType::Sha1
        );
    }
}
