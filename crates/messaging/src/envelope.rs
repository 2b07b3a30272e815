use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::EventType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribute key carrying the event type tag.
pub const EVENT_TYPE_ATTRIBUTE: &str = "eventType";

/// A typed string attribute attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    #[serde(rename = "Type")]
    pub data_type: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            value: value.into(),
        }
    }
}

/// Transport envelope around a serialized event.
///
/// Field names follow the SNS notification format. `message` holds the inner
/// event as a JSON string. Fields not listed here (signatures, unsubscribe
/// URL) are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message_id: Uuid,
    pub topic_arn: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
}

impl Notification {
    /// Wraps a serialized event for delivery on `topic`.
    pub fn wrap(topic: &str, event_type: EventType, message: String) -> Self {
        let mut message_attributes = HashMap::new();
        message_attributes.insert(
            EVENT_TYPE_ATTRIBUTE.to_string(),
            MessageAttribute::string(event_type.as_str()),
        );

        Self {
            kind: "Notification".to_string(),
            message_id: Uuid::new_v4(),
            topic_arn: topic.to_string(),
            message,
            timestamp: Utc::now(),
            message_attributes,
        }
    }

    /// Returns the event type named in the attributes, if present and known.
    pub fn event_type(&self) -> Option<EventType> {
        self.message_attributes
            .get(EVENT_TYPE_ATTRIBUTE)
            .and_then(|attr| attr.value.parse().ok())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
