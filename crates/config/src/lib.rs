//! Environment-driven configuration for the whole workspace. Every field here
//! is sourced from an environment variable (see spec §6) rather than a file,
//! since the deployment surface for this system is a set of env vars, not a
//! TOML config tree.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
    pub queue: String,
    pub delay_exchange: String,
    pub delay_queue: String,
    pub dlx_exchange: String,
    pub dead_letter_queue: String,
    pub max_retries: u32,
    pub retry_delay_ms: u32,
}

impl BrokerConfig {
    pub fn amqp_url(&self) -> String {
        let vhost = self.vhost.trim_start_matches('/');
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, vhost
        )
    }
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub portal_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub folder: String,
    pub target_sender: String,
    pub poll_interval_secs: u64,
    pub lookback_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// application_token -> domain
    pub token_to_domain: HashMap<String, String>,
    pub max_age_secs: i64,
    pub allowed_events: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub broker: BrokerConfig,
    pub crm: CrmConfig,
    pub imap: ImapConfig,
    pub webhook: WebhookConfig,
    /// 32-byte key backing the token store's AES-256-GCM cipher.
    pub encryption_key: [u8; 32],
    pub configured_managers: Vec<i64>,
    pub service_user_id: i64,
    pub test_mode: bool,
    pub test_deal_id: Option<i64>,
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn env_var_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the process environment. Call `dotenvy::dotenv()`
    /// before this in `main` to pick up a local `.env` file.
    pub fn from_env() -> Result<Config, ConfigError> {
        let db = DbConfig {
            host: env_var_or("DB_HOST", "localhost"),
            port: env_parse("DB_PORT", 5432)?,
            user: env_var("DB_USER")?,
            password: env_var("DB_PASSWORD")?,
            database: env_var("DB_NAME")?,
        };

        let broker = BrokerConfig {
            host: env_var_or("BROKER_HOST", "localhost"),
            port: env_parse("BROKER_PORT", 5672)?,
            user: env_var_or("BROKER_USER", "guest"),
            password: env_var_or("BROKER_PASSWORD", "guest"),
            vhost: env_var_or("BROKER_VHOST", "/"),
            exchange: env_var_or("BROKER_EXCHANGE", "price_requests"),
            queue: env_var_or("BROKER_QUEUE", "price_requests_main"),
            delay_exchange: env_var_or("BROKER_DELAY_EXCHANGE", "price_requests_delay"),
            delay_queue: env_var_or("BROKER_DELAY_QUEUE", "price_requests_delay_queue"),
            dlx_exchange: env_var_or("BROKER_DLX_EXCHANGE", "price_requests_dlx"),
            dead_letter_queue: env_var_or("BROKER_DEAD_LETTER_QUEUE", "price_requests_dead"),
            max_retries: env_parse("BROKER_MAX_RETRIES", 3)?,
            retry_delay_ms: env_parse("BROKER_RETRY_DELAY_MS", 30_000)?,
        };

        let crm = CrmConfig {
            portal_url: env_var("CRM_PORTAL_URL")?,
            client_id: env_var("CRM_CLIENT_ID")?,
            client_secret: env_var("CRM_CLIENT_SECRET")?,
            redirect_uri: env_var("CRM_REDIRECT_URI")?,
            max_retries: env_parse("CRM_MAX_RETRIES", 2)?,
        };

        let imap = ImapConfig {
            host: env_var_or("IMAP_HOST", "localhost"),
            port: env_parse("IMAP_PORT", 993)?,
            user: env_var_or("IMAP_USER", ""),
            password: env_var_or("IMAP_PASSWORD", ""),
            folder: env_var_or("IMAP_FOLDER", "INBOX"),
            target_sender: env_var_or("IMAP_TARGET_SENDER", ""),
            poll_interval_secs: env_parse("IMAP_POLL_INTERVAL_SECS", 60)?,
            lookback_minutes: env_parse("IMAP_LOOKBACK_MINUTES", 60)?,
        };

        let token_to_domain = parse_token_domain_map(&env_var_or("WEBHOOK_TOKEN_DOMAIN_MAP", ""));
        let allowed_events = parse_event_set(&env_var_or(
            "WEBHOOK_ALLOWED_EVENTS",
            "ONCRMDEALADD,ONCRMDEALUPDATE,ONCRMDEALDELETE",
        ));
        let webhook = WebhookConfig {
            token_to_domain,
            max_age_secs: env_parse("WEBHOOK_MAX_AGE_SECS", 300)?,
            allowed_events,
        };

        let key_hex = env_var("ENCRYPTION_KEY")?;
        let encryption_key = parse_encryption_key(&key_hex)?;

        let configured_managers = parse_id_list(&env_var_or("CONFIGURED_MANAGERS", ""));
        let service_user_id = env_parse("SERVICE_USER_ID", 1)?;
        let test_mode = env_parse("TEST_MODE", false)?;
        let test_deal_id = match std::env::var("TEST_DEAL_ID") {
            Ok(raw) if !raw.is_empty() => Some(
                raw.parse()
                    .map_err(|_| ConfigError::Invalid { name: "TEST_DEAL_ID", value: raw })?,
            ),
            _ => None,
        };

        Ok(Config {
            db,
            broker,
            crm,
            imap,
            webhook,
            encryption_key,
            configured_managers,
            service_user_id,
            test_mode,
            test_deal_id,
        })
    }
}

/// Parses entries like `tok_abc=portal1.bitrix24.ru,tok_def=portal2.bitrix24.ru`.
fn parse_token_domain_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(token, domain)| (token.trim().to_string(), domain.trim().to_string()))
        .collect()
}

fn parse_event_set(raw: &str) -> HashSet<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_uppercase).collect()
}

fn parse_id_list(raw: &str) -> Vec<i64> {
    let mut seen = HashSet::new();
    raw.split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

fn parse_encryption_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex_decode(raw).ok_or_else(|| ConfigError::Invalid {
        name: "ENCRYPTION_KEY",
        value: raw.to_string(),
    })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        name: "ENCRYPTION_KEY",
        value: raw.to_string(),
    })
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

    #[test]
    fn parses_token_domain_map() {
        let map = parse_token_domain_map("abc=portal1.bitrix24.ru, def=portal2.bitrix24.ru");
        assert_eq!(map.get("abc").unwrap(), "portal1.bitrix24.ru");
        assert_eq!(map.get("def").unwrap(), "portal2.bitrix24.ru");
    }

    #[test]
    fn parses_id_list_dedupes() {
        let ids = parse_id_list("1,2,2,3");
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert!(hex_decode("abc").is_none());
    }

    #[test]
    fn hex_decode_round_trips_32_bytes() {
        let hex: String = (0u8..32).map(|b| format!("{b:02x}")).collect();
        let key = parse_encryption_key(&hex).unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(key[0], 0);
        assert_eq!(key[31], 31);
    }
}
