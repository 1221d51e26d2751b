//! Consumes price-request envelopes off the main queue and turns each one
//! into a Bitrix24 deal via [`site_request::handle_request`], grounded in
//! the original's `RabbitMQConsumer.process_message`/`MessageHandler`/
//! `Sender`. Unlike the original (which calls out over HTTP to a separate
//! `site-request` service), this runs in-process, since both live in the
//! same binary here.

use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel};
use sqlx::PgPool;
use tracing::{error, info, warn};

use config::BrokerConfig;
use crm_client::CrmClient;
use site_request::{SiteRequestInput, handle_request};

const RETRY_COUNT_HEADER: &str = "x-retry-count";

fn envelope_to_input(envelope: &serde_json::Value) -> Option<SiteRequestInput> {
    let parsed = envelope.get("email")?.get("parsed_body")?;
    if parsed.is_null() {
        return None;
    }

    let phone = parsed.get("phone").and_then(|v| v.as_str())?.to_string();
    let product_xml_id = parsed.get("product_id").and_then(|v| v.as_i64()).map(|id| id.to_string());
    let name = parsed.get("name").and_then(|v| v.as_str()).map(str::to_string);
    let comment = parsed.get("comment").and_then(|v| v.as_str()).map(str::to_string);
    let message_id = envelope.get("email").and_then(|e| e.get("message_id")).and_then(|v| v.as_str()).map(str::to_string);

    Some(SiteRequestInput { phone, name, product_xml_id, product_discount: None, comment, message_id })
}

fn retry_count(headers: Option<&FieldTable>) -> u32 {
    headers
        .and_then(|h| h.inner().get(RETRY_COUNT_HEADER))
        .and_then(|v| match v {
            AMQPValue::LongInt(n) => Some(*n as u32),
            AMQPValue::ShortInt(n) => Some(*n as u32),
            _ => None,
        })
        .unwrap_or(0)
}

/// Runs the consume loop forever. Each delivery that fails processing is
/// republished onto the delay exchange with an incremented retry counter
/// until `max_retries` is exceeded, at which point it's nacked without
/// requeue so it lands on the dead-letter queue.
pub async fn run(channel: Channel, broker: BrokerConfig, pool: PgPool, crm: CrmClient) {
    let mut consumer = match channel
        .basic_consume(&broker.queue, "workers-site-request", BasicConsumeOptions::default(), FieldTable::default())
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to start consuming price-request queue");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "error receiving delivery");
                continue;
            }
        };

        let envelope: serde_json::Value = match serde_json::from_slice(&delivery.data) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "malformed envelope, dropping to dead letter queue");
                let _ = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
                continue;
            }
        };

        let Some(input) = envelope_to_input(&envelope) else {
            warn!("envelope has no parseable price-request body, acking without action");
            let _ = delivery.ack(BasicAckOptions::default()).await;
            continue;
        };

        match handle_request(&pool, &crm, &input).await {
            Ok(result) => {
                info!(deal_external_id = result.deal_external_id, "price request turned into a deal");
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                let attempt = retry_count(delivery.properties.headers().as_ref());
                if attempt < broker.max_retries {
                    warn!(error = %e, attempt, "price request failed, requeueing with delay");
                    requeue_with_delay(&channel, &broker, &delivery.data, attempt + 1).await;
                    let _ = delivery.ack(BasicAckOptions::default()).await;
                } else {
                    error!(error = %e, attempt, "price request exhausted retries, sending to dead letter queue");
                    let _ = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
                }
            }
        }
    }
}

async fn requeue_with_delay(channel: &Channel, broker: &BrokerConfig, payload: &[u8], retry_count: u32) {
    let mut headers = FieldTable::default();
    headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(retry_count as i32));
    let properties = BasicProperties::default().with_delivery_mode(2).with_headers(headers);

    if let Err(e) = channel
        .basic_publish(&broker.delay_exchange, &broker.delay_queue, BasicPublishOptions::default(), payload, properties)
        .await
    {
        error!(error = %e, "failed to republish to delay exchange");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_input_from_a_full_envelope() {
        let envelope = json!({
            "email": {
                "message_id": "42",
                "parsed_body": {
                    "phone": "79123456789",
                    "product_id": 5,
                    "name": "Иван",
                    "comment": "звонить после обеда",
                },
            },
        });
        let input = envelope_to_input(&envelope).unwrap();
        assert_eq!(input.phone, "79123456789");
        assert_eq!(input.product_xml_id.as_deref(), Some("5"));
        assert_eq!(input.message_id.as_deref(), Some("42"));
    }

    #[test]
    fn missing_parsed_body_yields_none() {
        let envelope = json!({ "email": { "message_id": "1", "parsed_body": null } });
        assert!(envelope_to_input(&envelope).is_none());
    }
}
