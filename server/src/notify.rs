//! Change-notification fan-out. Two independent delivery paths share the
//! ranking engine as their trigger: a best-effort UDP datagram to a
//! multicast group when a city's top hotel changes, and per-subscriber
//! delivery of the full new ordering when a city's ranking changes at all.

use log::{error, info, warn};
use shared::model::LocalRanking;
use shared::TransportError;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// Fire-and-forget announcements to a multicast group. Send failures are
/// logged and the socket is kept for the next announcement.
pub struct MulticastNotifier {
    socket: UdpSocket,
    group: SocketAddr,
}

impl MulticastNotifier {
    pub async fn new(group: Ipv4Addr, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            socket,
            group: SocketAddr::from((group, port)),
        })
    }

    pub async fn announce_top_changed(&self, city: &str, hotel_name: &str) {
        let message = format!("Top hotel changed for {}: {}", city, hotel_name);
        match self.socket.send_to(message.as_bytes(), self.group).await {
            Ok(_) => info!("announced top change for {}", city),
            Err(e) => error!("multicast announcement for {} failed: {}", city, e),
        }
    }
}

/// A notification endpoint. Delivery failure deregisters the subscriber.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, payload: &str) -> Result<(), TransportError>;
}

/// In-process subscriber backed by an unbounded channel; dropping the
/// receiving end makes every further delivery fail, which exercises the
/// automatic unsubscription path.
pub struct ChannelSubscriber {
    tx: UnboundedSender<String>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, payload: &str) -> Result<(), TransportError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| TransportError::Delivery("subscriber channel closed".to_string()))
    }
}

struct Subscription {
    subscriber: Box<dyn Subscriber>,
    cities: Vec<String>,
}

/// Maps subscriber handles to the cities they care about and pushes
/// serialized rankings to the interested ones.
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<u64, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe(&self, id: u64, subscriber: Box<dyn Subscriber>, cities: Vec<String>) {
        self.subscriptions
            .write()
            .await
            .insert(id, Subscription { subscriber, cities });
        info!("subscriber {} registered", id);
    }

    /// Unsubscribing an unknown handle is a no-op.
    pub async fn unsubscribe(&self, id: u64) {
        if self.subscriptions.write().await.remove(&id).is_some() {
            info!("subscriber {} removed", id);
        }
    }

    pub async fn is_subscribed(&self, id: u64) -> bool {
        self.subscriptions.read().await.contains_key(&id)
    }

    /// Delivers the serialized ranking to every subscriber interested in
    /// its city (case-insensitive). Failing subscribers are collected
    /// while iterating and removed afterwards, never mid-iteration.
    pub async fn notify_ranking_changed(&self, ranking: &LocalRanking) {
        let payload = match serde_json::to_string(ranking) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not serialize ranking for {}: {}", ranking.city, e);
                return;
            }
        };

        let mut failed = Vec::new();
        {
            let subscriptions = self.subscriptions.read().await;
            for (id, subscription) in subscriptions.iter() {
                let interested = subscription
                    .cities
                    .iter()
                    .any(|city| city.eq_ignore_ascii_case(&ranking.city));
                if !interested {
                    continue;
                }
                if let Err(e) = subscription.subscriber.deliver(&payload) {
                    warn!("dropping subscriber {} after failed delivery: {}", id, e);
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscriptions = self.subscriptions.write().await;
            for id in failed {
                subscriptions.remove(&id);
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
