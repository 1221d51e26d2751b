//! AMQP topology shared by the email publisher and the deal-request
//! consumer, grounded in the originals' two `rabbitmq_client.py`
//! implementations: a direct main exchange, a fanout dead-letter exchange,
//! and a delay exchange used to implement retry-with-backoff by re-queuing
//! through a TTL'd queue that dead-letters back onto the main routing key.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};

use config::BrokerConfig;

pub async fn declare_topology(channel: &Channel, cfg: &BrokerConfig) -> Result<(), lapin::Error> {
    let durable = ExchangeDeclareOptions { durable: true, ..Default::default() };

    channel.exchange_declare(&cfg.exchange, ExchangeKind::Direct, durable, FieldTable::default()).await?;
    channel.exchange_declare(&cfg.delay_exchange, ExchangeKind::Direct, durable, FieldTable::default()).await?;
    channel.exchange_declare(&cfg.dlx_exchange, ExchangeKind::Fanout, durable, FieldTable::default()).await?;

    let mut main_args = FieldTable::default();
    main_args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(cfg.dlx_exchange.clone().into()));
    channel
        .queue_declare(&cfg.queue, QueueDeclareOptions { durable: true, ..Default::default() }, main_args)
        .await?;
    channel
        .queue_bind(&cfg.queue, &cfg.exchange, &cfg.queue, QueueBindOptions::default(), FieldTable::default())
        .await?;

    let mut delay_args = FieldTable::default();
    delay_args.insert("x-message-ttl".into(), AMQPValue::LongInt(cfg.retry_delay_ms as i32));
    delay_args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(cfg.exchange.clone().into()));
    delay_args.insert("x-dead-letter-routing-key".into(), AMQPValue::LongString(cfg.queue.clone().into()));
    channel
        .queue_declare(&cfg.delay_queue, QueueDeclareOptions { durable: true, ..Default::default() }, delay_args)
        .await?;
    channel
        .queue_bind(
            &cfg.delay_queue,
            &cfg.delay_exchange,
            &cfg.delay_queue,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            &cfg.dead_letter_queue,
            QueueDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(&cfg.dead_letter_queue, &cfg.dlx_exchange, "", QueueBindOptions::default(), FieldTable::default())
        .await?;

    Ok(())
}
