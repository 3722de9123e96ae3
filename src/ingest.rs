//! MQTT ingestion of sensor uplinks.
//!
//! Devices publish JSON documents, either flat or wrapped in a network
//! uplink envelope (`uplink_message.decoded_payload`). Each accepted
//! payload becomes one [`Reading`], is persisted, and is appended to the
//! in-memory history used for serving.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use crate::{store, Config, Pollutant, Reading};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

// ---

/// Decode a raw MQTT payload. Invalid UTF-8 is replaced rather than
/// rejected; anything that is not a JSON object yields `None`.
pub fn decode_payload(bytes: &[u8]) -> Option<Map<String, Value>> {
    // ---
    let text = String::from_utf8_lossy(bytes);
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!("Ignoring non-object payload: {}", other);
            None
        }
        Err(e) => {
            warn!("Ignoring non-JSON payload: {}", e);
            None
        }
    }
}

/// Build a reading from a decoded payload.
///
/// Fields of `uplink_message.decoded_payload` take precedence over
/// top-level fields of the same name. The timestamp comes from
/// `timestamp`, then `received_at`, then `now`. Returns `None` when no
/// pollutant value could be extracted.
pub fn parse_payload(payload: &Map<String, Value>, now: DateTime<Utc>) -> Option<Reading> {
    // ---
    let mut fields = payload.clone();
    if let Some(Value::Object(decoded)) = payload
        .get("uplink_message")
        .and_then(|u| u.get("decoded_payload"))
    {
        for (k, v) in decoded {
            fields.insert(k.clone(), v.clone());
        }
    }

    let timestamp = ["timestamp", "received_at"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str).and_then(parse_timestamp))
        .unwrap_or(now);

    let mut reading = Reading::new(timestamp);
    for (name, value) in &fields {
        if let Some(pollutant) = Pollutant::from_field(name) {
            if let Some(v) = as_number(value) {
                reading.set(pollutant, v);
            }
        } else if name.eq_ignore_ascii_case("aqi") {
            reading.aqi = as_number(value).filter(|v| v.is_finite());
        }
    }

    if reading.has_any_value() {
        Some(reading)
    } else {
        debug!("Payload carried no pollutant values, dropping");
        None
    }
}

fn as_number(value: &Value) -> Option<f64> {
    // ---
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339, or a naive ISO 8601 date-time taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Persist a reading and append it to the live history.
async fn accept(reading: Reading, pool: &PgPool, state: &AppState) {
    // ---
    if let Err(e) = store::insert_reading(pool, &reading).await {
        error!("Failed to store reading: {}", e);
    }

    info!(
        timestamp = %reading.timestamp,
        values = reading.values.len(),
        "Received reading"
    );
    state.history.write().await.push(reading);
}

/// Connect to the broker and ingest uplinks until the process exits.
///
/// The subscription is renewed on every successful (re)connect, and
/// connection errors back off exponentially up to 30 seconds.
pub async fn run_listener(config: Config, state: Arc<AppState>, pool: PgPool) {
    // ---
    let client_id = format!("airsense-{}", uuid::Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, config.mqtt_broker.clone(), config.mqtt_port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_credentials(config.mqtt_username.clone(), config.mqtt_password.clone());

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let mut backoff = RECONNECT_MIN;

    info!(
        "Connecting to MQTT broker {}:{}",
        config.mqtt_broker, config.mqtt_port
    );

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff = RECONNECT_MIN;
                info!("Connected to MQTT broker, subscribing to {}", config.mqtt_topic);
                if let Err(e) = client.try_subscribe(config.mqtt_topic.clone(), QoS::AtLeastOnce) {
                    error!("Failed to subscribe to {}: {}", config.mqtt_topic, e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!("Message on {} ({} bytes)", publish.topic, publish.payload.len());
                let Some(payload) = decode_payload(&publish.payload) else {
                    continue;
                };
                if let Some(reading) = parse_payload(&payload, Utc::now()) {
                    accept(reading, &pool, &state).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {}, retrying in {:?}", e, backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RECONNECT_MAX);
            }
        }
    }
}
