use anyhow::{anyhow, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task;
use tracing::{error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_MIN: Duration = Duration::from_secs(5);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[async_trait::async_trait]
pub trait MqttPublisherClient: Send + Sync {
    /// Publishes at the client's configured QoS.
    async fn publish_bytes(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// Broker connection owner: drives the event loop, fans incoming publishes
/// out on a broadcast channel, and re-executes every registered
/// subscription after each reconnect.
#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    qos: QoS,
    tx: broadcast::Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<std::sync::RwLock<Vec<String>>>,
}

impl MqttClient {
    pub async fn new(broker_url: &str, client_id: &str, qos_level: u8) -> Result<Self> {
        let (host, port) = parse_broker_url(broker_url)?;
        let qos = parse_qos(qos_level)?;

        let mut mqttoptions = MqttOptions::new(client_id, host, port);
        mqttoptions.set_keep_alive(KEEP_ALIVE);
        mqttoptions.set_clean_session(false); // Persistent session for commands

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let (tx, _) = broadcast::channel(256);
        let tx_clone = tx.clone();
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();

        let subscriptions = Arc::new(std::sync::RwLock::new(Vec::new()));
        let subscriptions_clone = subscriptions.clone();
        let client_clone = client.clone();

        task::spawn(async move {
            let mut backoff = RECONNECT_MIN;
            loop {
                match eventloop.poll().await {
                    Ok(notification) => match notification {
                        Event::Incoming(Packet::Publish(publish)) => {
                            let msg = MqttMessage {
                                topic: publish.topic,
                                payload: publish.payload.to_vec(),
                            };
                            if tx_clone.send(msg).is_err() {
                                // No internal subscribers yet; drop quietly.
                            }
                        }
                        Event::Incoming(Packet::ConnAck(_)) => {
                            info!("MQTT connected");
                            connected_clone.store(true, Ordering::Relaxed);
                            backoff = RECONNECT_MIN;

                            // Re-subscribe to everything the dispatcher
                            // registered before the connection dropped.
                            let subs = subscriptions_clone.read().unwrap().clone();
                            if !subs.is_empty() {
                                info!(count = subs.len(), "re-subscribing to topics");
                                for topic in subs {
                                    if let Err(err) =
                                        client_clone.subscribe(&topic, qos).await
                                    {
                                        error!(%topic, %err, "failed to re-subscribe");
                                    }
                                }
                            }
                        }
                        Event::Outgoing(rumqttc::Outgoing::Disconnect) => {
                            connected_clone.store(false, Ordering::Relaxed);
                        }
                        _ => {}
                    },
                    Err(err) => {
                        warn!(%err, retry_in = ?backoff, "MQTT connection error");
                        connected_clone.store(false, Ordering::Relaxed);
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(RECONNECT_MAX);
                    }
                }
            }
        });

        Ok(Self {
            client,
            qos,
            tx,
            connected,
            subscriptions,
        })
    }

    /// Receiver for all incoming publishes across subscriptions.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    /// Subscribes and records the topic so it survives reconnects.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subs = self.subscriptions.write().unwrap();
            if !subs.iter().any(|t| t == topic) {
                subs.push(topic.to_string());
            }
        }

        self.client
            .subscribe(topic, self.qos)
            .await
            .map_err(|err| anyhow!("failed to subscribe to topic {topic}: {err}"))
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|err| anyhow!("failed to disconnect: {err}"))
    }
}

#[async_trait::async_trait]
impl MqttPublisherClient for MqttClient {
    async fn publish_bytes(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()> {
        self.client
            .publish(topic, self.qos, retain, payload)
            .await
            .map_err(|err| anyhow!("failed to publish MQTT message: {err}"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Accepts `mqtt://host:port`, `tcp://host:port`, or bare `host[:port]`.
/// The port defaults to 1883.
pub fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if rest.is_empty() {
        return Err(anyhow!("broker URL is empty"));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| anyhow!("invalid broker port in {url}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), 1883)),
    }
}

pub fn parse_qos(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(anyhow!("invalid MQTT QoS: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("mqtt://broker.local:1884").unwrap(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(
            parse_broker_url("tcp://10.0.0.5:1883").unwrap(),
            ("10.0.0.5".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_url("localhost").unwrap(),
            ("localhost".to_string(), 1883)
        );
        assert!(parse_broker_url("mqtt://host:notaport").is_err());
        assert!(parse_broker_url("").is_err());
    }

    #[test]
    fn test_parse_qos() {
        assert_eq!(parse_qos(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(parse_qos(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(parse_qos(2).unwrap(), QoS::ExactlyOnce);
        assert!(parse_qos(3).is_err());
    }
}
