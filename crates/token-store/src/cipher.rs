use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};
use thiserror::Error;

const SELF_TEST_SENTINEL: &str = "token-cipher-self-test-sentinel";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
    #[error("cipher self-test round-trip mismatch, refusing to start")]
    SelfTestFailed,
}

/// Authenticated symmetric cipher for at-rest tokens, AES-256-GCM with a
/// random 96-bit nonce prepended to the ciphertext. The Rust-idiomatic
/// equivalent of the original's Fernet-style token cipher.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &[u8; 32]) -> Result<Self, CipherError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let this = AesGcmCipher { cipher };
        this.self_test()?;
        Ok(this)
    }

    fn self_test(&self) -> Result<(), CipherError> {
        let encrypted = self.encrypt(SELF_TEST_SENTINEL)?;
        let decrypted = self.decrypt(&encrypted)?;
        if decrypted != SELF_TEST_SENTINEL {
            return Err(CipherError::SelfTestFailed);
        }
        Ok(())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(hex_encode(&out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let bytes = hex_decode(encoded).ok_or(CipherError::Decrypt)?;
        if bytes.len() < 12 {
            return Err(CipherError::Truncated);
        }
        let (nonce, ciphertext) = bytes.split_at(12);
        let plaintext = self
            .cipher
            .decrypt(nonce.into(), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Decrypt)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn round_trips() {
        let cipher = AesGcmCipher::new(&test_key()).unwrap();
        let encrypted = cipher.encrypt("access-token-value").unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "access-token-value");
    }

    #[test]
    fn distinct_ciphertexts_for_same_plaintext() {
        let cipher = AesGcmCipher::new(&test_key()).unwrap();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b, "random nonce should make repeated encryptions differ");
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let cipher = AesGcmCipher::new(&test_key()).unwrap();
        assert!(cipher.decrypt("ab").is_err());
    }
}
