//! Encrypted OAuth token cache with TTL (spec §4.1). Backed by an in-process
//! `moka` cache rather than Redis — the teacher already reaches for `moka`
//! for exactly this kind of keyed TTL cache (`nora::cache::LlmCache`), and the
//! store's public surface (`save`/`get`/`delete`/`ttl`/`exists`) is narrow
//! enough to swap in a networked backend later without touching callers.

mod cipher;

use std::time::Instant;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, warn};

pub use cipher::{AesGcmCipher, CipherError};

pub const DEFAULT_ACCESS_TTL_SECS: u64 = 1_800;
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 15_552_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn label(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }

    fn default_ttl(&self) -> u64 {
        match self {
            TokenKind::Access => DEFAULT_ACCESS_TTL_SECS,
            TokenKind::Refresh => DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token storage backend unavailable: {0}")]
    Connection(String),
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

#[derive(Clone)]
struct Entry {
    ciphertext: String,
    saved_at: Instant,
    ttl_secs: u64,
}

pub struct TokenStore {
    access: Cache<String, Entry>,
    refresh: Cache<String, Entry>,
    cipher: AesGcmCipher,
}

fn build_key(kind: TokenKind, user_id: &str, provider: &str) -> String {
    format!("token:{}:user:{}:provider:{}", kind.label(), user_id, provider)
}

impl TokenStore {
    pub fn new(encryption_key: &[u8; 32]) -> Result<Self, TokenStoreError> {
        let cipher = AesGcmCipher::new(encryption_key)?;
        Ok(TokenStore {
            access: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(DEFAULT_REFRESH_TTL_SECS))
                .build(),
            refresh: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(DEFAULT_REFRESH_TTL_SECS))
                .build(),
            cipher,
        })
    }

    fn cache_for(&self, kind: TokenKind) -> &Cache<String, Entry> {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub async fn save(
        &self,
        token: &str,
        kind: TokenKind,
        user_id: &str,
        provider: &str,
        expire_seconds: Option<u64>,
    ) -> Result<String, TokenStoreError> {
        let ttl_secs = expire_seconds.unwrap_or_else(|| kind.default_ttl());
        let key = build_key(kind, user_id, provider);
        let ciphertext = self.cipher.encrypt(token)?;
        self.cache_for(kind)
            .insert(
                key.clone(),
                Entry {
                    ciphertext,
                    saved_at: Instant::now(),
                    ttl_secs,
                },
            )
            .await;
        debug!(key = %key, ttl_secs, "token saved");
        Ok(key)
    }

    pub async fn get(
        &self,
        kind: TokenKind,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<String>, TokenStoreError> {
        let key = build_key(kind, user_id, provider);
        let Some(entry) = self.cache_for(kind).get(&key).await else {
            debug!(key = %key, "token not found");
            return Ok(None);
        };
        if entry.saved_at.elapsed().as_secs() >= entry.ttl_secs {
            self.cache_for(kind).invalidate(&key).await;
            return Ok(None);
        }
        match self.cipher.decrypt(&entry.ciphertext) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                warn!(key = %key, error = %err, "token decrypt failed, treating as absent");
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, kind: TokenKind, user_id: &str, provider: &str) -> Result<bool, TokenStoreError> {
        let key = build_key(kind, user_id, provider);
        let existed = self.cache_for(kind).get(&key).await.is_some();
        self.cache_for(kind).invalidate(&key).await;
        Ok(existed)
    }

    pub async fn ttl(&self, kind: TokenKind, user_id: &str, provider: &str) -> Result<Option<u64>, TokenStoreError> {
        let key = build_key(kind, user_id, provider);
        let Some(entry) = self.cache_for(kind).get(&key).await else {
            return Ok(None);
        };
        let elapsed = entry.saved_at.elapsed().as_secs();
        Ok(Some(entry.ttl_secs.saturating_sub(elapsed)))
    }

    pub async fn exists(&self, kind: TokenKind, user_id: &str, provider: &str) -> Result<bool, TokenStoreError> {
        Ok(self.get(kind, user_id, provider).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        [3u8; 32]
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = TokenStore::new(&key()).unwrap();
        store
            .save("abc123", TokenKind::Access, "1", "bitrix24", None)
            .await
            .unwrap();
        let token = store.get(TokenKind::Access, "1", "bitrix24").await.unwrap();
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn missing_token_returns_none() {
        let store = TokenStore::new(&key()).unwrap();
        let token = store.get(TokenKind::Refresh, "99", "bitrix24").await.unwrap();
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn delete_reports_prior_existence() {
        let store = TokenStore::new(&key()).unwrap();
        store
            .save("tok", TokenKind::Access, "1", "bitrix24", None)
            .await
            .unwrap();
        assert!(store.delete(TokenKind::Access, "1", "bitrix24").await.unwrap());
        assert!(!store.delete(TokenKind::Access, "1", "bitrix24").await.unwrap());
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time_close_to_default() {
        let store = TokenStore::new(&key()).unwrap();
        store
            .save("tok", TokenKind::Access, "1", "bitrix24", Some(100))
            .await
            .unwrap();
        let remaining = store.ttl(TokenKind::Access, "1", "bitrix24").await.unwrap().unwrap();
        assert!(remaining <= 100 && remaining > 90);
    }

    #[tokio::test]
    async fn exists_reflects_presence() {
        let store = TokenStore::new(&key()).unwrap();
        assert!(!store.exists(TokenKind::Access, "1", "bitrix24").await.unwrap());
        store
            .save("tok", TokenKind::Access, "1", "bitrix24", None)
            .await
            .unwrap();
        assert!(store.exists(TokenKind::Access, "1", "bitrix24").await.unwrap());
    }
}
