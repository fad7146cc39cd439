//! Application event bus
//!
//! The bus is created during assembly, handed to the initialize hook, and
//! returned to the caller so it can attach listeners. Generated handlers
//! publish a [`AppEvent::Mutation`] for every write.
//!
//! # Architecture
//!
//! ```text
//! create() ──────────┐
//!                    ├──▶ EventBus::publish() ──▶ broadcast channel ──▶ caller listeners
//! mutation handlers ─┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = builder.create(&mut app, Some("secret"), options).await?;
//!
//! let mut rx = bus.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(envelope) = rx.recv().await {
//!         println!("{:?}", envelope.event);
//!     }
//! });
//! ```

use crate::core::action::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published by the framework
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppEvent {
    /// The initialize hook finished; entity mounting follows
    Initialized { environment: String },

    /// An entity's routes were mounted on the application
    EntityMounted { entity: String, routes: usize },

    /// A generated route changed stored data
    Mutation {
        entity: String,
        action: Action,
        data: serde_json::Value,
    },

    /// Client-defined event
    Custom {
        name: String,
        payload: serde_json::Value,
    },
}

impl AppEvent {
    pub fn event_kind(&self) -> &str {
        match self {
            AppEvent::Initialized { .. } => "initialized",
            AppEvent::EntityMounted { .. } => "entity_mounted",
            AppEvent::Mutation { .. } => "mutation",
            AppEvent::Custom { .. } => "custom",
        }
    }

    /// Get the entity this event relates to
    pub fn entity(&self) -> Option<&str> {
        match self {
            AppEvent::EntityMounted { entity, .. } | AppEvent::Mutation { entity, .. } => {
                Some(entity)
            }
            AppEvent::Initialized { .. } | AppEvent::Custom { .. } => None,
        }
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: AppEvent,
}

impl EventEnvelope {
    pub fn new(event: AppEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails. Returns the number of receivers that will get the event;
    /// with no subscribers the event is dropped.
    pub fn publish(&self, event: AppEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mutation_event_serialization() {
        let event = AppEvent::Mutation {
            entity: "users".to_string(),
            action: Action::CreateOne,
            data: json!({"id": "1"}),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "mutation");
        assert_eq!(json["action"], "createOne");
        assert_eq!(json["entity"], "users");
    }

    #[test]
    fn test_event_entity_accessor() {
        let mounted = AppEvent::EntityMounted {
            entity: "comments".to_string(),
            routes: 6,
        };
        assert_eq!(mounted.entity(), Some("comments"));
        assert_eq!(mounted.event_kind(), "entity_mounted");

        let init = AppEvent::Initialized {
            environment: "dev".to_string(),
        };
        assert_eq!(init.entity(), None);
    }

    #[test]
    fn test_event_envelope_has_metadata() {
        let envelope = EventEnvelope::new(AppEvent::Custom {
            name: "warmup".to_string(),
            payload: json!({}),
        });
        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let receivers = bus.publish(AppEvent::Custom {
            name: "ping".to_string(),
            payload: json!({"n": 1}),
        });
        assert_eq!(receivers, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.event_kind(), "custom");
    }

    #[tokio::test]
    async fn test_event_bus_clone_shares_channel() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let clone = bus.clone();
        clone.publish(AppEvent::Initialized {
            environment: "test".to_string(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.event_kind(), "initialized");
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn test_event_bus_publish_without_subscribers() {
        let bus = EventBus::default();
        let receivers = bus.publish(AppEvent::Custom {
            name: "noop".to_string(),
            payload: json!(null),
        });
        assert_eq!(receivers, 0);
    }
}
