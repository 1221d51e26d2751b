//! Background workers (spec §4.10 components J/K): an IMAP poller that
//! turns price-request emails into broker messages, and a broker consumer
//! that turns those messages into Bitrix24 deals via [`site_request`].

pub mod broker;
pub mod consumer;
pub mod email;
pub mod error;
pub mod parser;

pub use email::EmailEnvelope;
pub use error::WorkerError;
pub use parser::ParsedRequest;

use lapin::{Connection, ConnectionProperties};
use sqlx::PgPool;
use tracing::info;

use config::Config;
use crm_client::CrmClient;

/// Connects to the broker, declares the shared topology once, and spawns
/// both the email-poll loop and the deal-request consumer as background
/// tasks. Returns the open connection so the caller can hold it for the
/// lifetime of the process.
pub async fn spawn(config: &Config, pool: PgPool, crm: CrmClient) -> Result<Connection, lapin::Error> {
    let connection = Connection::connect(&config.broker.amqp_url(), ConnectionProperties::default()).await?;

    let publish_channel = connection.create_channel().await?;
    broker::declare_topology(&publish_channel, &config.broker).await?;

    let consume_channel = connection.create_channel().await?;
    broker::declare_topology(&consume_channel, &config.broker).await?;

    let imap_cfg = config.imap.clone();
    let broker_cfg = config.broker.clone();
    tokio::spawn(async move {
        info!("starting email poll loop");
        email::run(imap_cfg, publish_channel, broker_cfg).await
    });

    let broker_cfg = config.broker.clone();
    tokio::spawn(async move {
        info!("starting price-request consumer");
        consumer::run(consume_channel, broker_cfg, pool, crm).await
    });

    Ok(connection)
}
