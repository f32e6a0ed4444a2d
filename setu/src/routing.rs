//! Message routing: frame → (category, payload)
//!
//! The device wraps every reading in a single-key object whose key names the
//! store path it belongs under:
//!
//! ```text
//! {"winding": {"turns": 120, "ok": true}}
//!  ^^^^^^^^^  ^^^^^^^^^^^^^^^^^^^^^^^^^^
//!  category   payload (forwarded verbatim)
//! ```
//!
//! Only the first declared member is used; any further members are ignored.

use crate::error::{Error, Result};
use crate::framing::Frame;
use serde_json::Value;

/// A routed frame
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// First top-level key of the frame
    pub category: String,
    /// Value under `category`, not validated
    pub payload: Value,
}

impl Message {
    /// Compact JSON text of the payload (the uplink request body)
    pub fn body(&self) -> String {
        // Serializing a `Value` cannot fail: its keys are always strings
        self.payload.to_string()
    }
}

/// Decode a frame and pick its category. The frame is consumed either way.
pub fn route(frame: Frame) -> Result<Message> {
    let value: Value = serde_json::from_slice(frame.as_bytes())?;

    let Value::Object(map) = value else {
        return Err(Error::EmptyObject);
    };

    // `preserve_order` keeps declaration order, so this is the first member
    let (category, payload) = map.into_iter().next().ok_or(Error::EmptyObject)?;
    Ok(Message { category, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(text: &str) -> Frame {
        Frame::new(text.as_bytes().to_vec())
    }

    #[test]
    fn test_first_member_wins() {
        let msg = route(frame(r#"{"winding":{"x":1},"extra":2}"#)).unwrap();
        assert_eq!(msg.category, "winding");
        assert_eq!(msg.payload, json!({"x": 1}));
    }

    #[test]
    fn test_declaration_order_not_alphabetical() {
        let msg = route(frame(r#"{"zeta":1,"alpha":2}"#)).unwrap();
        assert_eq!(msg.category, "zeta");
        assert_eq!(msg.payload, json!(1));
    }

    #[test]
    fn test_scalar_payload_forwarded() {
        let msg = route(frame(r#"{"machine_error":"E42"}"#)).unwrap();
        assert_eq!(msg.category, "machine_error");
        assert_eq!(msg.body(), r#""E42""#);
    }

    #[test]
    fn test_body_is_compact() {
        let msg = route(frame("{ \"testing\" : { \"v\" : 3.5 ,\n \"ok\": true } }")).unwrap();
        assert_eq!(msg.body(), r#"{"v":3.5,"ok":true}"#);
    }

    #[test]
    fn test_invalid_json() {
        let result = route(frame(r#"{"a":}"#));
        assert!(matches!(result, Err(Error::InvalidJson(_))));
    }

    #[test]
    fn test_empty_object() {
        assert!(matches!(route(frame("{}")), Err(Error::EmptyObject)));
    }

    #[test]
    fn test_non_object() {
        assert!(matches!(route(frame("[1,2]")), Err(Error::EmptyObject)));
        assert!(matches!(route(frame("42")), Err(Error::EmptyObject)));
    }
}
