//! Inbound build notifications.
//!
//! The CI server announces build phases on a pub/sub feed. Each message is
//! handed to the daemon as one raw frame, `"<topic> <payload>"`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::config::FeedConfig;

// ── Feed trait ────────────────────────────────────────────────

#[async_trait]
pub trait Feed: Send {
    /// Next raw frame, or `None` once the feed has closed for good.
    async fn next_frame(&mut self) -> Option<Vec<u8>>;

    /// Release the connection; called once when the listener is cancelled.
    async fn close(&mut self) {}
}

/// Join a topic and payload the way the notification decoder expects.
pub fn frame(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(topic.len() + 1 + payload.len());
    frame.extend_from_slice(topic.as_bytes());
    frame.push(b' ');
    frame.extend_from_slice(payload);
    frame
}

// ── MQTT ──────────────────────────────────────────────────────

/// Subscribes to one topic; reconnects on its own after broker errors.
pub struct MqttFeed {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
}

impl MqttFeed {
    pub fn new(config: &FeedConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
        let (client, eventloop) = AsyncClient::new(options, 64);
        Self {
            client,
            eventloop,
            topic: config.topic.clone(),
        }
    }
}

#[async_trait]
impl Feed for MqttFeed {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // subscriptions do not survive a clean-session reconnect
                    match self.client.subscribe(&self.topic, QoS::AtLeastOnce).await {
                        Ok(()) => tracing::info!(topic = %self.topic, "subscribed to build feed"),
                        Err(e) => tracing::error!(topic = %self.topic, error = %e, "subscribe failed"),
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Some(frame(&publish.topic, &publish.payload));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "MQTT event loop error, reconnecting in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "MQTT disconnect failed");
        }
    }
}

// ── Mock ──────────────────────────────────────────────────────

/// What a [`MockFeed`] has handed out so far.
#[derive(Debug, Clone, Default)]
pub struct FeedLog {
    pub delivered: usize,
    pub closed: bool,
}

/// Replays scripted frames, then reports closed (or stays silent).
pub struct MockFeed {
    frames: VecDeque<Vec<u8>>,
    hold_open: bool,
    log: Arc<Mutex<FeedLog>>,
}

impl MockFeed {
    pub fn new<I, F>(frames: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Vec<u8>>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            hold_open: false,
            log: Arc::new(Mutex::new(FeedLog::default())),
        }
    }

    /// Wait forever after the last frame instead of closing.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn handle(&self) -> Arc<Mutex<FeedLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl Feed for MockFeed {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        if let Some(frame) = self.frames.pop_front() {
            self.log.lock().unwrap().delivered += 1;
            return Some(frame);
        }
        if self.hold_open {
            std::future::pending::<()>().await;
        }
        None
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_joins_topic_and_payload() {
        assert_eq!(frame("ci/builds", b"{\"a\":1}"), b"ci/builds {\"a\":1}".to_vec());
    }

    #[tokio::test]
    async fn mock_replays_then_closes() {
        let mut feed = MockFeed::new(["one", "two"]);
        let log = feed.handle();
        assert_eq!(feed.next_frame().await, Some(b"one".to_vec()));
        assert_eq!(feed.next_frame().await, Some(b"two".to_vec()));
        assert_eq!(feed.next_frame().await, None);
        feed.close().await;

        let log = log.lock().unwrap();
        assert_eq!(log.delivered, 2);
        assert!(log.closed);
    }

    #[tokio::test]
    async fn held_open_feed_stays_silent() {
        let mut feed = MockFeed::new(Vec::<Vec<u8>>::new()).hold_open();
        let next = tokio::time::timeout(Duration::from_millis(20), feed.next_frame()).await;
        assert!(next.is_err());
    }
}
