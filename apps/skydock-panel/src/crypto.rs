use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;

/// AES-256-GCM envelope for SSH credentials at rest. The transport format is
/// base64(nonce || ciphertext) with a random 96-bit nonce per encryption.
#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Build from a base64-encoded 32-byte key (`SKYDOCK_ENCRYPTION_KEY`).
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let key_bytes = general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|e| anyhow!("encryption key is not valid base64: {}", e))?;

        if key_bytes.len() != 32 {
            return Err(anyhow!(
                "encryption key must be 32 bytes (256 bits), got {}",
                key_bytes.len()
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow!("failed to build cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key in the encoding `from_base64_key` accepts.
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        general_purpose::STANDARD.encode(key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; 12];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("encryption failed: {}", e))?;

        let mut envelope = nonce_bytes.to_vec();
        envelope.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(envelope))
    }

    pub fn decrypt(&self, envelope_b64: &str) -> Result<String> {
        let envelope = general_purpose::STANDARD
            .decode(envelope_b64)
            .map_err(|e| anyhow!("ciphertext is not valid base64: {}", e))?;

        if envelope.len() < 12 {
            return Err(anyhow!("ciphertext too short"));
        }

        let (nonce_bytes, ciphertext) = envelope.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow!("decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow!("decrypted data is not UTF-8: {}", e))
    }
}

/// Random alphanumeric string, used for generated DB passwords and
/// WordPress salts.
pub fn generate_password(length: usize) -> String {
    use rand::distr::{Alphanumeric, SampleString};
    Alphanumeric.sample_string(&mut rand::rng(), length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box() -> SecretBox {
        SecretBox::from_base64_key(&SecretBox::generate_key()).unwrap()
    }

    #[test]
    fn round_trip() {
        let secrets = test_box();
        let encrypted = secrets.encrypt("hunter2").unwrap();
        assert_ne!(encrypted, "hunter2");
        assert_eq!(secrets.decrypt(&encrypted).unwrap(), "hunter2");
    }

    #[test]
    fn same_plaintext_different_ciphertexts() {
        let secrets = test_box();
        let a = secrets.encrypt("same").unwrap();
        let b = secrets.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(secrets.decrypt(&a).unwrap(), secrets.decrypt(&b).unwrap());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(SecretBox::from_base64_key("not-base64!!!").is_err());
        let short = general_purpose::STANDARD.encode([0u8; 16]);
        assert!(SecretBox::from_base64_key(&short).is_err());
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let secrets = test_box();
        let garbage = general_purpose::STANDARD.encode([0u8; 5]);
        assert!(secrets.decrypt(&garbage).is_err());
    }

    #[test]
    fn generated_passwords_have_requested_length() {
        let pw = generate_password(16);
        assert_eq!(pw.len(), 16);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_password(64), generate_password(64));
    }
}
