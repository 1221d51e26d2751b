//! Polls a shared mailbox for price-request emails and republishes each one
//! onto the broker, grounded in the original's `EmailClient`/`EmailChecker`
//! (IMAP fetch, header decoding, multipart body extraction) and
//! `EmailWorkerService` (poll loop, mark-as-read on successful publish).
//!
//! Unlike the original, the IMAP connection here keeps the library's default
//! TLS certificate verification rather than disabling it — there is no
//! reason for this system to trust an unauthenticated mail server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use imap::Session;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use mail_parser::MessageParser;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use config::ImapConfig;

use crate::error::WorkerError;
use crate::parser::{self, ParsedRequest};

#[derive(Debug, Clone, Serialize)]
pub struct EmailEnvelope {
    pub message_id: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub recipient: String,
    pub received_date: DateTime<Utc>,
    pub attachments_count: usize,
    pub parsed_body: Option<ParsedRequest>,
}

impl EmailEnvelope {
    fn to_wire(&self) -> serde_json::Value {
        json!({
            "type": "email_message",
            "email": self,
            "processed_at": Utc::now().to_rfc3339(),
            "source": "email_worker_service",
        })
    }
}

type ImapSession = Session<Box<dyn imap::ImapConnection>>;

fn connect(cfg: &ImapConfig) -> Result<ImapSession, WorkerError> {
    let client = imap::ClientBuilder::new(&cfg.host, cfg.port).connect()?;
    let mut session = client.login(&cfg.user, &cfg.password).map_err(|(err, _client)| err)?;
    session.select(&cfg.folder)?;
    Ok(session)
}

fn parse_message(raw: &[u8], uid: u32) -> Option<EmailEnvelope> {
    let message = MessageParser::default().parse(raw)?;

    let subject = message.subject().unwrap_or_default().to_string();
    let sender = message.from().and_then(|f| f.first()).and_then(|a| a.address()).unwrap_or_default().to_string();
    let recipient = message.to().and_then(|t| t.first()).and_then(|a| a.address()).unwrap_or_default().to_string();
    let body = message.body_text(0).map(|b| b.trim().to_string()).unwrap_or_default();
    let received_date = message
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let attachments_count = message.attachments().count();
    let message_id = message.message_id().map(str::to_string).unwrap_or_else(|| uid.to_string());

    let parsed_body = parser::parse_request(&body);

    Some(EmailEnvelope { message_id, subject, body, sender, recipient, received_date, attachments_count, parsed_body })
}

/// Fetches unseen mail from the configured sender newer than the lookback
/// window, parses each one, and publishes it onto the broker. Messages are
/// marked `\Seen` as soon as they're fetched and parsed, on the same IMAP
/// session that read them — a crash between fetch and publish means the
/// email is lost rather than redelivered, matching the original's ordering.
pub async fn poll_once(cfg: &ImapConfig, channel: &Channel, broker: &config::BrokerConfig) -> Result<usize, WorkerError> {
    let blocking_cfg = cfg.clone();
    let envelopes = tokio::task::spawn_blocking(move || fetch_unseen(&blocking_cfg))
        .await
        .expect("imap poll task panicked")?;

    let mut published = 0usize;
    for envelope in envelopes {
        let payload = serde_json::to_vec(&envelope.to_wire())?;
        channel
            .basic_publish(
                &broker.exchange,
                &broker.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        published += 1;
    }

    Ok(published)
}

fn fetch_unseen(cfg: &ImapConfig) -> Result<Vec<EmailEnvelope>, WorkerError> {
    let mut session = connect(cfg)?;
    let since = (Utc::now() - chrono::Duration::minutes(cfg.lookback_minutes)).format("%d-%b-%Y");
    let query = format!("UNSEEN SINCE {since} FROM \"{}\"", cfg.target_sender);
    debug!(%query, "searching mailbox");

    let uids = session.search(&query)?;
    info!(count = uids.len(), "found candidate emails");

    let mut out = Vec::new();
    for uid in uids {
        let fetches = match session.fetch(uid.to_string(), "RFC822") {
            Ok(f) => f,
            Err(e) => {
                warn!(uid, error = %e, "failed to fetch email");
                continue;
            }
        };
        let Some(raw) = fetches.iter().next().and_then(|f| f.body()) else {
            warn!(uid, "email fetch returned no body");
            continue;
        };
        match parse_message(raw, uid) {
            Some(envelope) => {
                if let Err(e) = session.store(uid.to_string(), "+FLAGS (\\Seen)") {
                    warn!(uid, error = %e, "failed to mark email as read");
                }
                out.push(envelope);
            }
            None => warn!(uid, "failed to parse email body"),
        }
    }

    let _ = session.logout();
    Ok(out)
}

/// Runs the poll loop forever, sleeping `poll_interval_secs` between checks
/// and logging (not propagating) per-cycle errors so one bad cycle doesn't
/// kill the worker.
pub async fn run(cfg: ImapConfig, channel: Channel, broker: config::BrokerConfig) -> ! {
    loop {
        match poll_once(&cfg, &channel, &broker).await {
            Ok(n) if n > 0 => info!(published = n, "email poll cycle complete"),
            Ok(_) => debug!("no new emails"),
            Err(e) => error!(error = %e, "email poll cycle failed"),
        }
        tokio::time::sleep(Duration::from_secs(cfg.poll_interval_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_shape_carries_type_and_source() {
        let envelope = EmailEnvelope {
            message_id: "1".into(),
            subject: "Запрос цены".into(),
            body: "Товар: Насос (ID: 1)".into(),
            sender: "site@example.com".into(),
            recipient: "sales@example.com".into(),
            received_date: Utc::now(),
            attachments_count: 0,
            parsed_body: None,
        };
        let wire = envelope.to_wire();
        assert_eq!(wire["type"], "email_message");
        assert_eq!(wire["source"], "email_worker_service");
        assert_eq!(wire["email"]["subject"], "Запрос цены");
    }
}
