use bincode::config::{Configuration, standard};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::Document;

/// Binary encoding of local payloads.
#[derive(Clone, Copy)]
pub struct Codec(Configuration);

impl Default for Codec {
    fn default() -> Self {
        Codec(standard())
    }
}

impl Codec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, String> {
        bincode::serde::encode_to_vec(value, self.0).map_err(|e| e.to_string())
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, String> {
        let (value, read) =
            bincode::serde::decode_from_slice(bytes, self.0).map_err(|e| e.to_string())?;
        if read != bytes.len() {
            return Err(format!(
                "{} trailing bytes after payload",
                bytes.len() - read
            ));
        }
        Ok(value)
    }
}

/// Converts a record into its document form.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, String> {
    match serde_json::to_value(value).map_err(|e| e.to_string())? {
        Value::Object(document) => Ok(document),
        other => Err(format!("expected an object, found {other}")),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, String> {
    serde_json::from_value(Value::Object(document)).map_err(|e| e.to_string())
}

/// Merges `patch` into `document`, field by field.
///
/// The `id` field is immutable: a patch may repeat it but not change it.
pub fn merge(document: &mut Document, patch: &Document) -> Result<(), String> {
    if let Some(id) = patch.get("id")
        && document.get("id") != Some(id)
    {
        return Err(format!("cannot change id to {id}"));
    }
    for (field, value) in patch {
        document.insert(field.clone(), value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::{Component, LoginSession, Role};

    fn component() -> Component {
        Component {
            id: "c1".into(),
            name: "Servo".into(),
            category: "actuators".into(),
            description: None,
            total_quantity: 4,
            available_quantity: 4,
        }
    }

    #[test]
    fn documents_use_camel_case_fields() {
        let document = to_document(&component()).unwrap();
        assert_eq!(document["availableQuantity"], json!(4));
        assert_eq!(document["description"], Value::Null);
    }

    #[test]
    fn timestamps_are_epoch_millis() {
        let session = LoginSession {
            id: "s1".into(),
            user_id: "u1".into(),
            user_email: "a@lab".into(),
            user_name: "Ada".into(),
            user_role: Role::Student,
            login_time: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            logout_time: None,
            session_duration: None,
            device_info: "Desktop".into(),
            is_active: true,
        };
        let document = to_document(&session).unwrap();
        assert_eq!(document["loginTime"], json!(1_700_000_000_123_i64));
        assert_eq!(document["userRole"], json!("student"));
        assert_eq!(from_document::<LoginSession>(document).unwrap(), session);
    }

    #[test]
    fn merge_refuses_id_change() {
        let mut document = to_document(&component()).unwrap();
        let patch = to_document(&json!({"id": "c2"})).unwrap();
        assert!(merge(&mut document, &patch).is_err());

        let patch = to_document(&json!({"id": "c1", "availableQuantity": 1})).unwrap();
        merge(&mut document, &patch).unwrap();
        assert_eq!(document["availableQuantity"], json!(1));
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = Codec::default();
        let bytes = codec.encode(&component()).unwrap();
        assert_eq!(codec.decode::<Component>(&bytes).unwrap(), component());
        assert!(codec.decode::<Component>(&[0xff, 0x00, 0x13]).is_err());
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(codec.decode::<Component>(&padded).is_err());
    }
}
