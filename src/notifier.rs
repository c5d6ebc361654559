//! Wake-up fan-out. A push in one session should trigger a prompt pull in
//! every other session of the same tenant: same-process sessions over a
//! broadcast bus, other devices over a best-effort public pub/sub relay.
//! Delivery is unordered, lossy and may duplicate; receivers only ever react
//! by scheduling a pull, which is idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};

/*──────── relay seam ───────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    /// Live channel established.
    Open,
    /// Something changed somewhere; pull.
    Ping,
    /// Live channel lost; the subscriber keeps reconnecting silently.
    Closed,
}

#[async_trait]
pub trait WakeRelay: Send + Sync + 'static {
    /// Best-effort publish; failures are swallowed.
    async fn publish(&self, topic: &str);
    /// Long-lived subscription. The stream never errors out; it reports drops
    /// as `Closed` and recoveries as `Open`.
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<RelayEvent>;
}

/*──────── in-memory relay (tests, single process) ───────*/

/// Topic registry of broadcast channels. Share one instance between simulated
/// devices.
#[derive(Default)]
pub struct InMemRelay {
    topics: DashMap<String, broadcast::Sender<()>>,
}

impl InMemRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn topic(&self, name: &str) -> broadcast::Sender<()> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

#[async_trait]
impl WakeRelay for InMemRelay {
    async fn publish(&self, topic: &str) {
        let _ = self.topic(topic).send(());
    }

    fn subscribe(&self, topic: &str) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(16);
        let mut source = self.topic(topic).subscribe();
        tokio::spawn(async move {
            if tx.send(RelayEvent::Open).await.is_err() {
                return;
            }
            loop {
                match source.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if tx.send(RelayEvent::Ping).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(RelayEvent::Closed).await;
                        return;
                    }
                }
            }
        });
        rx
    }
}

/*──────── HTTP relay (ntfy-style) ───────*/

/// Publishes with a plain POST to `{base}/{topic}` and subscribes to the SSE
/// stream at `{base}/{topic}/sse`, reconnecting with a fixed backoff when the
/// stream drops. Reconnects are silent; losing the channel only degrades sync
/// to the periodic timer cadence.
pub struct HttpRelay {
    client: reqwest::Client,
    base: String,
    reconnect: std::time::Duration,
}

impl HttpRelay {
    pub fn new(base: impl Into<String>, reconnect: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            client: reqwest::Client::new(),
            base: base.into(),
            reconnect,
        })
    }
}

#[async_trait]
impl WakeRelay for HttpRelay {
    async fn publish(&self, topic: &str) {
        let res = self
            .client
            .post(format!("{}/{}", self.base, topic))
            .header("Title", "DB Update")
            .header("Priority", "5")
            .json(&serde_json::json!({ "action": "RELOAD" }))
            .send()
            .await;
        if let Err(e) = res {
            tracing::debug!(topic, error = %e, "relay publish failed");
        }
    }

    fn subscribe(&self, topic: &str) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(16);
        let client = self.client.clone();
        let url = format!("{}/{}/sse", self.base, topic);
        let reconnect = self.reconnect;
        tokio::spawn(async move {
            loop {
                match client.get(&url).send().await {
                    Ok(res) if res.status().is_success() => {
                        if tx.send(RelayEvent::Open).await.is_err() {
                            return;
                        }
                        let mut stream = res.bytes_stream();
                        let mut buf = Vec::new();
                        while let Some(chunk) = stream.next().await {
                            let Ok(bytes) = chunk else { break };
                            buf.extend_from_slice(&bytes);
                            while let Some(nl) = buf.iter().position(|b| *b == b'\n') {
                                let line: Vec<u8> = buf.drain(..=nl).collect();
                                if line.starts_with(b"data:")
                                    && tx.send(RelayEvent::Ping).await.is_err()
                                {
                                    return;
                                }
                            }
                        }
                    }
                    _ => {}
                }
                if tx.send(RelayEvent::Closed).await.is_err() {
                    return;
                }
                tokio::time::sleep(reconnect).await;
            }
        });
        rx
    }
}

/*──────── combined notifier ───────*/

/// Same-process bus. Clone one handle into every session that should hear
/// sibling sessions, like browser tabs sharing a broadcast channel.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<String>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(64).0,
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Notifier {
    relay: Arc<dyn WakeRelay>,
    bus: LocalBus,
    topic: String,
}

impl Notifier {
    pub fn new(relay: Arc<dyn WakeRelay>, bus: LocalBus, topic: String) -> Self {
        Self { relay, bus, topic }
    }

    /// Fan a "data changed" signal out to sibling sessions and other devices.
    pub async fn fan_out(&self) {
        let _ = self.bus.tx.send(self.topic.clone());
        self.relay.publish(&self.topic).await;
    }

    pub fn subscribe_local(&self) -> broadcast::Receiver<String> {
        self.bus.tx.subscribe()
    }

    pub fn subscribe_relay(&self) -> mpsc::Receiver<RelayEvent> {
        self.relay.subscribe(&self.topic)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_ping_reaches_all_subscribers() {
        let relay = InMemRelay::new();
        let mut a = relay.subscribe("t1");
        let mut b = relay.subscribe("t1");
        assert_eq!(a.recv().await, Some(RelayEvent::Open));
        assert_eq!(b.recv().await, Some(RelayEvent::Open));

        relay.publish("t1").await;
        assert_eq!(a.recv().await, Some(RelayEvent::Ping));
        assert_eq!(b.recv().await, Some(RelayEvent::Ping));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let relay = InMemRelay::new();
        let mut a = relay.subscribe("t1");
        assert_eq!(a.recv().await, Some(RelayEvent::Open));

        relay.publish("t2").await;
        relay.publish("t1").await;
        // Only the t1 ping arrives.
        assert_eq!(a.recv().await, Some(RelayEvent::Ping));
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn fan_out_hits_bus_and_relay() {
        let relay = InMemRelay::new();
        let bus = LocalBus::new();
        let notifier = Notifier::new(relay.clone(), bus.clone(), "sync-live-v2-t1".into());

        let mut local = notifier.subscribe_local();
        let mut remote = notifier.subscribe_relay();
        assert_eq!(remote.recv().await, Some(RelayEvent::Open));

        notifier.fan_out().await;
        assert_eq!(local.recv().await.unwrap(), "sync-live-v2-t1");
        assert_eq!(remote.recv().await, Some(RelayEvent::Ping));
    }
}
