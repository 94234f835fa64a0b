//! Progress events emitted while exporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the object an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ObjectState {
    Processing,
    Failed(String),
}

/// `(label, object, state)` progress notification.
///
/// Task headers and run markers carry an empty `object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub label: String,
    pub object: String,
    #[serde(flatten)]
    pub state: ObjectState,
}

impl ProgressEvent {
    /// Task header or run marker.
    pub fn header(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            object: String::new(),
            state: ObjectState::Processing,
        }
    }

    pub fn processing(label: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            object: object.into(),
            state: ObjectState::Processing,
        }
    }

    pub fn failed(
        label: impl Into<String>,
        object: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            object: object.into(),
            state: ObjectState::Failed(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.state, ObjectState::Failed(_))
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.object.is_empty() {
            write!(f, "{}", self.label)?;
        } else {
            write!(f, "  {}:{}", self.label, self.object)?;
        }
        if let ObjectState::Failed(message) = &self.state {
            write!(f, " FAILED: {}", message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProgressEvent::header("Tables").to_string(), "Tables");
        assert_eq!(
            ProgressEvent::processing("Table", "dbo.Orders").to_string(),
            "  Table:dbo.Orders"
        );
        assert_eq!(
            ProgressEvent::failed("Table", "dbo.Orders", "disk full").to_string(),
            "  Table:dbo.Orders FAILED: disk full"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(ProgressEvent::failed("View", "dbo.V", "boom")).unwrap();
        assert_eq!(json["label"], "View");
        assert_eq!(json["object"], "dbo.V");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(ProgressEvent::header("Views")).unwrap();
        assert_eq!(json["state"], "processing");
    }
}
