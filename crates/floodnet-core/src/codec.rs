//! Pluggable payload codec and confidentiality transform
//!
//! The overlays serialize their wire bodies through [`encode`]/[`decode`]
//! and seal them with a [`Cipher`]. Both are seams: the simulator ships an
//! identity transform and a postcard codec, and callers may inject their
//! own. Successful decryption is treated as proof of authenticity; the
//! protocol carries no signatures.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{CodecError, CryptoError};
use crate::identity::Address;

/// Pluggable confidentiality transform over opaque key bytes
pub trait Cipher: Send + Sync {
    /// Seal plaintext under a public key
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Vec<u8>;

    /// Open ciphertext with the matching private key
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// No-op transform; the default for simulation runs
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCipher;

impl Cipher for IdentityCipher {
    fn encrypt(&self, _key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        plaintext.to_vec()
    }

    fn decrypt(&self, _key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(ciphertext.to_vec())
    }
}

/// Wire body of a name-resolution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Public key of the requesting node, used to seal the response
    pub requester_key: Vec<u8>,
    /// Randomly drawn identifier the response will be addressed to
    pub response_id: Address,
    /// Names to look up
    pub names: Vec<String>,
}

/// Wire body of a name-resolution response
///
/// A miss is reported as `None`, never fabricated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub entries: Vec<(String, Option<Vec<u8>>)>,
}

/// Encode an overlay body with the default postcard codec
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode an overlay body with the default postcard codec
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_request_roundtrip() {
        let request = ResolveRequest {
            requester_key: vec![1, 2, 3],
            response_id: Address::for_key(b"response"),
            names: vec!["Service0".to_string(), "Service1".to_string()],
        };

        let bytes = encode(&request).unwrap();
        let decoded: ResolveRequest = decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_resolve_response_preserves_misses() {
        let response = ResolveResponse {
            entries: vec![
                ("Service0".to_string(), Some(vec![9, 9])),
                ("Missing".to_string(), None),
            ],
        };

        let bytes = encode(&response).unwrap();
        let decoded: ResolveResponse = decode(&bytes).unwrap();
        assert_eq!(decoded.entries[1].1, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<ResolveRequest, _> = decode(&[0xff, 0xff, 0xff]);
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_cipher_is_transparent() {
        let cipher = IdentityCipher;
        let sealed = cipher.encrypt(b"key", b"hello");
        assert_eq!(cipher.decrypt(b"other key", &sealed).unwrap(), b"hello");
    }
}
