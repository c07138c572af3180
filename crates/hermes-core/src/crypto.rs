use std::io::Read;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const ED25519_PUBLIC_KEY_BYTES: usize = 32;
const DEVICE_SECRET_KEY_BYTES: usize = 64;
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Problems with user-entered values. Never produced by the engines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("Public key contains invalid characters")]
    InvalidCharacters,
    #[error("Public key is not valid base64")]
    InvalidEncoding,
    #[error("Public key must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPublicKey {
    pub normalized: String,
    pub fingerprint: String,
}

pub fn parse_ed25519_public_key(input: &str) -> Result<ParsedPublicKey, ValidationError> {
    let normalized: String = input.chars().filter(|ch| !ch.is_whitespace()).collect();
    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "Public key",
        });
    }
    if !normalized
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '/' | '='))
    {
        return Err(ValidationError::InvalidCharacters);
    }

    let decoded = STANDARD
        .decode(normalized.as_bytes())
        .map_err(|_| ValidationError::InvalidEncoding)?;
    if decoded.len() != ED25519_PUBLIC_KEY_BYTES {
        return Err(ValidationError::InvalidLength {
            expected: ED25519_PUBLIC_KEY_BYTES,
            actual: decoded.len(),
        });
    }

    Ok(ParsedPublicKey {
        fingerprint: fingerprint_of(&decoded),
        normalized,
    })
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint_of(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Streams the file through SHA-256 and returns the lowercase hex digest.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; HASH_CHUNK_BYTES];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Reads the device secret key `zend` keeps on disk and encodes it for `zenc decrypt`.
pub fn read_device_secret_key(path: &Path) -> Result<String, ValidationError> {
    let bytes = std::fs::read(path)
        .map_err(|_| ValidationError::Message("Device identity key not found".to_owned()))?;
    if bytes.len() < DEVICE_SECRET_KEY_BYTES {
        return Err(ValidationError::Message(
            "Device identity key is invalid".to_owned(),
        ));
    }
    Ok(STANDARD.encode(&bytes[..DEVICE_SECRET_KEY_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whitespace_split_32_byte_keys() {
        let raw = [7_u8; 32];
        let encoded = STANDARD.encode(raw);
        let (head, tail) = encoded.split_at(10);

        let parsed = parse_ed25519_public_key(&format!(" {head}\n {tail} ")).expect("valid key");
        assert_eq!(parsed.normalized, encoded);
        assert_eq!(parsed.fingerprint, fingerprint_of(&raw));
        assert_eq!(parsed.fingerprint.len(), 64);
    }

    #[test]
    fn rejects_empty_foreign_and_wrong_length_keys() {
        assert_eq!(
            parse_ed25519_public_key("   "),
            Err(ValidationError::Required {
                field: "Public key"
            })
        );
        assert_eq!(
            parse_ed25519_public_key("abc-def"),
            Err(ValidationError::InvalidCharacters)
        );
        assert_eq!(
            parse_ed25519_public_key(&STANDARD.encode([1_u8; 16])),
            Err(ValidationError::InvalidLength {
                expected: 32,
                actual: 16
            })
        );
        assert_eq!(
            parse_ed25519_public_key("===="),
            Err(ValidationError::InvalidEncoding)
        );
    }

    #[test]
    fn device_key_uses_first_64_bytes() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("identity");

        assert_eq!(
            read_device_secret_key(&path),
            Err(ValidationError::Message("Device identity key not found".to_owned()))
        );

        std::fs::write(&path, [1_u8; 10]).expect("write short key");
        assert!(read_device_secret_key(&path).is_err());

        let mut bytes = vec![2_u8; 64];
        bytes.extend_from_slice(&[9_u8; 32]);
        std::fs::write(&path, &bytes).expect("write key");
        assert_eq!(
            read_device_secret_key(&path).expect("key"),
            STANDARD.encode([2_u8; 64])
        );
    }

    #[test]
    fn file_hash_matches_in_memory_digest() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("payload.bin");
        let payload = vec![42_u8; HASH_CHUNK_BYTES + 17];
        std::fs::write(&path, &payload).expect("write payload");

        assert_eq!(sha256_file(&path).expect("hash"), fingerprint_of(&payload));
    }
}
