//! WebSocket and HTTP wire formats spoken with the backend.
//!
//! Server frames are JSON objects `{"type": <event type>, "data": <payload>}`.
//! They are decoded once, at the connection boundary, into [`ServerEvent`];
//! nothing downstream sees untyped JSON except for event types this client
//! does not know about ([`ServerEvent::Other`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, DecodeError};
use crate::models::LedStatus;

/// Event type names as they appear in the `type` field.
pub mod event_types {
    pub const LED_STATUS_CHANGED: &str = "LedStatusChanged";
    pub const CONNECTION_STATUS_CHANGED: &str = "ConnectionStatusChanged";
    pub const LED_PREVIEW_STATE_CHANGED: &str = "LedPreviewStateChanged";
    pub const LED_SORTED_COLORS_CHANGED: &str = "LedSortedColorsChanged";
    pub const LED_COLORS_CHANGED: &str = "LedColorsChanged";
    pub const CONFIG_CHANGED: &str = "ConfigChanged";
    pub const BOARDS_CHANGED: &str = "BoardsChanged";
    pub const DISPLAYS_CHANGED: &str = "DisplaysChanged";
    pub const AMBIENT_LIGHT_STATE_CHANGED: &str = "AmbientLightStateChanged";
    pub const NAVIGATE: &str = "Navigate";
    pub const SUBSCRIPTION_CONFIRMED: &str = "SubscriptionConfirmed";
    pub const PING: &str = "Ping";
    pub const PONG: &str = "Pong";

    /// Listener key that receives every event.
    pub const WILDCARD: &str = "*";

    pub const KNOWN: &[&str] = &[
        LED_STATUS_CHANGED,
        CONNECTION_STATUS_CHANGED,
        LED_PREVIEW_STATE_CHANGED,
        LED_SORTED_COLORS_CHANGED,
        LED_COLORS_CHANGED,
        CONFIG_CHANGED,
        BOARDS_CHANGED,
        DISPLAYS_CHANGED,
        AMBIENT_LIGHT_STATE_CHANGED,
        NAVIGATE,
        SUBSCRIPTION_CONFIRMED,
        PING,
        PONG,
    ];

    /// Types produced by the client itself or by the subscription protocol.
    /// They are never sent in a Subscribe request.
    pub fn is_local(event_type: &str) -> bool {
        matches!(
            event_type,
            CONNECTION_STATUS_CHANGED | SUBSCRIPTION_CONFIRMED | WILDCARD
        )
    }
}

/// Payload of `LedPreviewStateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedPreviewState {
    pub enabled: bool,
}

/// Payload of `LedSortedColorsChanged`: one fragment of the sorted color buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedColorsFragment {
    pub sorted_colors: Vec<u8>,
    /// Byte offset of `sorted_colors` within the full buffer.
    #[serde(default)]
    pub offset: usize,
}

/// Events pushed by the backend over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    LedStatusChanged(LedStatus),
    /// Synthesized locally on socket open (`true`) and close (`false`).
    ConnectionStatusChanged(bool),
    LedPreviewStateChanged(LedPreviewState),
    LedSortedColorsChanged(SortedColorsFragment),
    LedColorsChanged { colors: Vec<u8> },
    ConfigChanged { config: Value },
    BoardsChanged { boards: Value },
    DisplaysChanged { displays: Value },
    AmbientLightStateChanged { state: Value },
    Navigate { path: String },
    SubscriptionConfirmed { event_types: Vec<String> },
    Ping,
    Pong,
    /// An event type this client has no schema for, passed through as-is.
    #[serde(skip)]
    Other {
        event_type: String,
        data: Option<Value>,
    },
}

impl ServerEvent {
    pub fn event_type(&self) -> &str {
        use event_types::*;
        match self {
            ServerEvent::LedStatusChanged(_) => LED_STATUS_CHANGED,
            ServerEvent::ConnectionStatusChanged(_) => CONNECTION_STATUS_CHANGED,
            ServerEvent::LedPreviewStateChanged(_) => LED_PREVIEW_STATE_CHANGED,
            ServerEvent::LedSortedColorsChanged(_) => LED_SORTED_COLORS_CHANGED,
            ServerEvent::LedColorsChanged { .. } => LED_COLORS_CHANGED,
            ServerEvent::ConfigChanged { .. } => CONFIG_CHANGED,
            ServerEvent::BoardsChanged { .. } => BOARDS_CHANGED,
            ServerEvent::DisplaysChanged { .. } => DISPLAYS_CHANGED,
            ServerEvent::AmbientLightStateChanged { .. } => AMBIENT_LIGHT_STATE_CHANGED,
            ServerEvent::Navigate { .. } => NAVIGATE,
            ServerEvent::SubscriptionConfirmed { .. } => SUBSCRIPTION_CONFIRMED,
            ServerEvent::Ping => PING,
            ServerEvent::Pong => PONG,
            ServerEvent::Other { event_type, .. } => event_type,
        }
    }

    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::NotJson(e.to_string()))?;

        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if !event_types::KNOWN.contains(&event_type.as_str()) {
            let data = value.get("data").cloned();
            return Ok(ServerEvent::Other { event_type, data });
        }

        serde_json::from_value(value).map_err(|e| DecodeError::Payload {
            event_type,
            reason: e.to_string(),
        })
    }
}

/// Control messages sent from the client.
///
/// The two subscription envelopes are shaped differently on the wire
/// (`data: [...]` versus `data: {event_types: [...]}`); the backend expects
/// exactly these shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    Subscribe(Vec<String>),
    Unsubscribe { event_types: Vec<String> },
    Ping,
    /// Reply to a server-side JSON `Ping`.
    Pong,
}

impl ClientMessage {
    pub fn subscribe<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientMessage::Subscribe(event_types.into_iter().map(Into::into).collect())
    }

    pub fn unsubscribe<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientMessage::Unsubscribe {
            event_types: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Event types carried by a subscription message.
    pub fn event_types(&self) -> &[String] {
        match self {
            ClientMessage::Subscribe(types) => types,
            ClientMessage::Unsubscribe { event_types } => event_types,
            ClientMessage::Ping | ClientMessage::Pong => &[],
        }
    }
}

/// Envelope wrapping every HTTP response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    /// The backend has used both `message` and `error` for this field.
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Convert the envelope into its payload, turning `success: false` into
    /// an application error.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ApiError::Application(
                self.message
                    .unwrap_or_else(|| "Request failed without a message".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_envelopes_keep_their_wire_shapes() {
        let sub = serde_json::to_value(ClientMessage::subscribe(["LedStatusChanged"])).unwrap();
        assert_eq!(sub, json!({"type": "Subscribe", "data": ["LedStatusChanged"]}));

        let unsub =
            serde_json::to_value(ClientMessage::unsubscribe(["LedStatusChanged"])).unwrap();
        assert_eq!(
            unsub,
            json!({"type": "Unsubscribe", "data": {"event_types": ["LedStatusChanged"]}})
        );
    }

    #[test]
    fn decodes_subscription_confirmation() {
        let event = ServerEvent::decode(
            r#"{"type":"SubscriptionConfirmed","data":{"event_types":["LedStatusChanged"]}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::SubscriptionConfirmed {
                event_types: vec!["LedStatusChanged".to_string()]
            }
        );
    }

    #[test]
    fn decodes_sorted_colors_with_default_offset() {
        let event = ServerEvent::decode(
            r#"{"type":"LedSortedColorsChanged","data":{"sorted_colors":[1,2,3]}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::LedSortedColorsChanged(fragment) => {
                assert_eq!(fragment.offset, 0);
                assert_eq!(fragment.sorted_colors, vec![1, 2, 3]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn decodes_unit_events_without_data() {
        assert_eq!(ServerEvent::decode(r#"{"type":"Pong"}"#).unwrap(), ServerEvent::Pong);
    }

    #[test]
    fn unknown_types_pass_through() {
        let event = ServerEvent::decode(r#"{"type":"VolumeChanged","data":{"level":3}}"#).unwrap();
        assert_eq!(event.event_type(), "VolumeChanged");
        assert_eq!(
            event,
            ServerEvent::Other {
                event_type: "VolumeChanged".to_string(),
                data: Some(json!({"level": 3}))
            }
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            ServerEvent::decode("not json"),
            Err(DecodeError::NotJson(_))
        ));
        assert_eq!(
            ServerEvent::decode(r#"{"data":1}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            ServerEvent::decode(r#"{"type":42}"#),
            Err(DecodeError::MissingType)
        );
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"ConnectionStatusChanged","data":"yes"}"#),
            Err(DecodeError::Payload { event_type, .. }) if event_type == "ConnectionStatusChanged"
        ));
    }

    #[test]
    fn envelope_failure_becomes_application_error() {
        let resp: ApiResponse<String> =
            serde_json::from_str(r#"{"success":false,"data":null,"error":"no such strip"}"#)
                .unwrap();
        assert_eq!(
            resp.into_result(),
            Err(ApiError::Application("no such strip".to_string()))
        );

        let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true,"data":5}"#).unwrap();
        assert_eq!(resp.into_result(), Ok(Some(5)));
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Strip {
        id: u32,
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> ApiResponse<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn envelope_data_may_be_absent_for_any_payload_type() {
        let resp: ApiResponse<Strip> = parse(r#"{"success":true}"#);
        assert_eq!(resp.data, None);
        assert_eq!(resp.into_result(), Ok(None));

        let resp: ApiResponse<Strip> = parse(r#"{"success":true,"data":{"id":4}}"#);
        assert_eq!(resp.data, Some(Strip { id: 4 }));
    }

    #[test]
    fn local_types_are_never_subscribed() {
        assert!(event_types::is_local(event_types::CONNECTION_STATUS_CHANGED));
        assert!(event_types::is_local(event_types::WILDCARD));
        assert!(!event_types::is_local(event_types::LED_STATUS_CHANGED));
    }
}
