use serde::{Deserialize, Serialize};

/// `type` of engine-originated error frames.
pub const ERROR_KIND: &str = "error";

/// One message frame, either direction.
///
/// The gateway treats everything except `type` and `requestId` as opaque:
/// unknown fields round-trip untouched through the flattened map. Frames
/// without a `requestId` are broadcast rather than routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(
        rename = "requestId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<String>,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            request_id: None,
            rest: serde_json::Map::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.rest.insert(key.into(), value);
        self
    }

    /// Build an engine-style error frame:
    /// `{type: "error", error, errorCode?, requestId?}`.
    pub fn error(
        message: impl Into<String>,
        code: Option<String>,
        request_id: Option<String>,
    ) -> Self {
        let mut frame = Self::new(ERROR_KIND)
            .with_field("error", serde_json::Value::String(message.into()));
        if let Some(code) = code {
            frame = frame.with_field("errorCode", serde_json::Value::String(code));
        }
        frame.request_id = request_id;
        frame
    }

    pub fn is_error(&self) -> bool {
        self.kind == ERROR_KIND
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_opaque_fields() {
        let raw = r#"{"type":"suivre","requestId":"r1","chemin":"a/b","n":3}"#;
        let frame: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "suivre");
        assert_eq!(frame.request_id.as_deref(), Some("r1"));
        assert_eq!(frame.rest["chemin"], "a/b");
        assert_eq!(frame.rest["n"], 3);

        let back: Envelope = serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn omits_absent_request_id() {
        let frame = Envelope::new("event");
        let text = serde_json::to_string(&frame).unwrap();
        assert!(!text.contains("requestId"));
    }

    #[test]
    fn error_frame_shape() {
        let frame = Envelope::error("engine exploded", Some("E_BOOM".into()), Some("7:r".into()));
        assert!(frame.is_error());
        assert_eq!(frame.rest["error"], "engine exploded");
        assert_eq!(frame.rest["errorCode"], "E_BOOM");
        assert_eq!(frame.request_id.as_deref(), Some("7:r"));
    }

    #[test]
    fn error_frame_without_code() {
        let frame = Envelope::error("oops", None, None);
        assert!(!frame.rest.contains_key("errorCode"));
        assert!(frame.request_id.is_none());
    }
}
