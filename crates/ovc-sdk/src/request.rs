//! Request bodies marked for asynchronous execution
//!
//! The G8 runs a call as a background task when its JSON body carries
//! `"_async": true` and answers with the task id instead of the result.

use crate::error::{OvcError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

const ASYNC_FIELD: &str = "_async";

/// Typed payload with the `_async` flag set
///
/// A payload field named `_async` is overridden, the same as for raw bodies.
#[derive(Debug)]
pub struct AsyncBody<'a, T: ?Sized + Serialize> {
    payload: &'a T,
}

impl<'a, T: ?Sized + Serialize> AsyncBody<'a, T> {
    pub fn new(payload: &'a T) -> Self {
        Self { payload }
    }

    /// Serialize; the payload must be a JSON object
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let value =
            serde_json::to_value(self.payload).map_err(|e| OvcError::Encoding(e.to_string()))?;
        match value {
            Value::Object(object) => with_async_flag(object),
            other => Err(not_an_object(&other)),
        }
    }
}

/// Add the `_async` flag to a raw JSON body; no body becomes `{"_async":true}`
pub fn mark_async(raw: Option<&[u8]>) -> Result<Vec<u8>> {
    let object = match raw {
        None => Map::new(),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(object)) => object,
            Ok(other) => return Err(not_an_object(&other)),
            Err(e) => {
                tracing::error!(
                    "Failed to parse json body: {}\njson body:\n{}",
                    e,
                    String::from_utf8_lossy(bytes)
                );
                return Err(OvcError::Encoding(e.to_string()));
            }
        },
    };
    with_async_flag(object)
}

fn with_async_flag(mut object: Map<String, Value>) -> Result<Vec<u8>> {
    object.insert(ASYNC_FIELD.to_string(), Value::Bool(true));
    serde_json::to_vec(&object).map_err(|e| OvcError::Encoding(e.to_string()))
}

fn not_an_object(value: &Value) -> OvcError {
    OvcError::Encoding(format!("request body must be a JSON object, got {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct MachineRef {
        #[serde(rename = "machineId")]
        machine_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    }

    fn decode(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_typed_body_gets_flag() {
        let body = MachineRef {
            machine_id: 12,
            name: None,
        };
        let bytes = AsyncBody::new(&body).to_vec().unwrap();
        assert_eq!(decode(&bytes), json!({"machineId": 12, "_async": true}));
    }

    #[test]
    fn test_map_body_gets_flag() {
        let body = json!({"cloudspaceId": 3});
        let bytes = AsyncBody::new(&body).to_vec().unwrap();
        assert_eq!(decode(&bytes), json!({"cloudspaceId": 3, "_async": true}));
    }

    #[test]
    fn test_typed_body_flag_overrides_payload_field() {
        let body = json!({"_async": false, "a": 1});
        let bytes = AsyncBody::new(&body).to_vec().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap().matches("_async").count(),
            1
        );
        assert_eq!(
            decode(&AsyncBody::new(&body).to_vec().unwrap()),
            json!({"a": 1, "_async": true})
        );
    }

    #[test]
    fn test_non_object_typed_body_rejected() {
        let err = AsyncBody::new(&42).to_vec().unwrap_err();
        assert!(matches!(err, OvcError::Encoding(_)));
    }

    #[test]
    fn test_missing_raw_body() {
        assert_eq!(decode(&mark_async(None).unwrap()), json!({"_async": true}));
    }

    #[test]
    fn test_raw_body_keeps_fields() {
        let bytes = mark_async(Some(br#"{"accountId": 4, "_async": false}"#)).unwrap();
        assert_eq!(decode(&bytes), json!({"accountId": 4, "_async": true}));
    }

    #[test]
    fn test_invalid_raw_body_rejected() {
        assert!(matches!(
            mark_async(Some(b"{not json")),
            Err(OvcError::Encoding(_))
        ));
        assert!(matches!(
            mark_async(Some(b"[1, 2]")),
            Err(OvcError::Encoding(_))
        ));
    }
}
