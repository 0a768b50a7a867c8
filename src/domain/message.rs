//! Event bus message model
//!
//! Delivery mode travels as message attributes so publishers share one
//! method signature for both direct and fan-out delivery.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Destination used for fan-out messages
pub const FANOUT_DESTINATION: &str = "subscriber";

/// How a message reaches its consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Single named destination
    Direct { destination: String },
    /// Every subscriber of the topic
    Fanout,
}

impl Delivery {
    pub fn exchange_type(&self) -> &'static str {
        match self {
            Delivery::Direct { .. } => "direct",
            Delivery::Fanout => "fanout",
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            Delivery::Direct { destination } => destination,
            Delivery::Fanout => FANOUT_DESTINATION,
        }
    }
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Direct { destination } => write!(f, "direct:{}", destination),
            Delivery::Fanout => write!(f, "fanout"),
        }
    }
}

/// Routing metadata attached to every message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttributes {
    pub source: String,
    pub destination: String,
    pub exchange_type: String,
}

/// A message as it travels on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub message_id: Uuid,
    /// JSON-encoded payload
    pub body: String,
    pub attributes: MessageAttributes,
}

impl BusMessage {
    pub fn new(origin: &str, delivery: &Delivery, payload: &serde_json::Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            body: payload.to_string(),
            attributes: MessageAttributes {
                source: origin.to_string(),
                destination: delivery.destination().to_string(),
                exchange_type: delivery.exchange_type().to_string(),
            },
        }
    }

    pub fn is_fanout(&self) -> bool {
        self.attributes.exchange_type == "fanout"
    }

    /// Whether a subscriber registered under `name` should receive this message
    pub fn is_addressed_to(&self, name: &str) -> bool {
        self.is_fanout() || self.attributes.destination == name
    }

    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}
