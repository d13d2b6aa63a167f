use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use rand::RngCore;
use std::path::Path;

const NONCE_LEN: usize = 12;

/// Field-level symmetric encryption for credential material and proxy
/// passwords. Ciphertext is `base64(nonce || aes_gcm_ciphertext)`; mask-only
/// on all read paths — only the outbound client factory decrypts.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    pub fn new(key_bytes: &[u8]) -> anyhow::Result<Self> {
        if key_bytes.len() != 32 {
            anyhow::bail!("FIELD_ENCRYPTION_KEY must decode to exactly 32 bytes");
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Parse a key from base64 or hex; whichever decodes cleanly to 32 bytes.
    pub fn from_encoded(text: &str) -> anyhow::Result<Self> {
        let text = text.trim();
        if let Ok(bytes) = b64.decode(text) {
            if bytes.len() == 32 {
                return Self::new(&bytes);
            }
        }
        if let Ok(bytes) = decode_hex(text) {
            if bytes.len() == 32 {
                return Self::new(&bytes);
            }
        }
        anyhow::bail!("FIELD_ENCRYPTION_KEY is neither valid base64 nor hex for a 32-byte key")
    }

    /// Load from env, from a key file, or auto-generate a dev-convenience
    /// key under `./data/` when `allow_dev_generate` is set (mirrors
    /// `APP_ENV=dev` auto-generation in the original system).
    pub fn load(
        inline_key: Option<&str>,
        key_file: Option<&Path>,
        allow_dev_generate: bool,
        dev_key_path: &Path,
    ) -> anyhow::Result<Self> {
        if let Some(k) = inline_key {
            return Self::from_encoded(k);
        }
        if let Some(path) = key_file {
            let contents = std::fs::read_to_string(path)?;
            return Self::from_encoded(contents.trim());
        }
        if allow_dev_generate {
            if let Ok(contents) = std::fs::read_to_string(dev_key_path) {
                return Self::from_encoded(contents.trim());
            }
            let mut key_bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut key_bytes);
            let encoded = b64.encode(key_bytes);
            if let Some(parent) = dev_key_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dev_key_path, &encoded)?;
            return Self::from_encoded(&encoded);
        }
        anyhow::bail!("encryption not configured")
    }

    pub fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("field encryption failed"))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(b64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> anyhow::Result<String> {
        let raw = b64
            .decode(encoded)
            .map_err(|_| anyhow::anyhow!("invalid stored token"))?;
        if raw.len() < NONCE_LEN {
            anyhow::bail!("invalid stored token");
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| anyhow::anyhow!("invalid stored token"))?;
        String::from_utf8(plaintext).map_err(|_| anyhow::anyhow!("invalid stored token"))
    }
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        anyhow::bail!("odd length hex string");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

/// Mask any secret for display: always `***`, matching the original
/// `mask_secret` convenience (never a partial reveal).
pub fn mask_secret(_plaintext: &str) -> &'static str {
    "***"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> Vault {
        Vault::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn roundtrip_encrypt_decrypt() {
        let vault = test_vault();
        let ct = vault.encrypt("super-secret-refresh-token").unwrap();
        assert_ne!(ct, "super-secret-refresh-token");
        let pt = vault.decrypt(&ct).unwrap();
        assert_eq!(pt, "super-secret-refresh-token");
    }

    #[test]
    fn encrypt_is_nondeterministic() {
        let vault = test_vault();
        let a = vault.encrypt("same").unwrap();
        let b = vault.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let vault = test_vault();
        let mut ct = vault.encrypt("hello").unwrap();
        ct.push('A');
        assert!(vault.decrypt(&ct).is_err());
    }

    #[test]
    fn from_encoded_accepts_hex_and_base64() {
        let hex_key = "00".repeat(32);
        assert!(Vault::from_encoded(&hex_key).is_ok());
        let b64_key = b64.encode([1u8; 32]);
        assert!(Vault::from_encoded(&b64_key).is_ok());
    }

    #[test]
    fn mask_is_always_three_stars() {
        assert_eq!(mask_secret("anything"), "***");
    }
}
