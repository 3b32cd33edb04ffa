//! Realtime wire protocol between browser clients and the coordinator.
//!
//! Every frame is a JSON text message with an internally-tagged `"type"`
//! discriminator so both sides can route messages by type string.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EpochMillis, UnitId};
use crate::unit::{Unit, UnitStatus};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ask for the full set of active holds.
    #[serde(rename = "requestSnapshot")]
    RequestSnapshot,

    /// Hold (`status = pending`) or release (any other status) a unit.
    ///
    /// The whole unit object is sent; the coordinator derives the delta.
    #[serde(rename = "holdOrReleaseIntent")]
    HoldOrReleaseIntent { unit: Unit },
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Every active hold, sent on connect and on request.
    #[serde(rename = "snapshot")]
    Snapshot { holds: Vec<HoldSnapshot> },

    /// A hold or release performed by another connection.
    #[serde(rename = "unitUpdated")]
    UnitUpdated { unit: Unit },

    /// Holds dropped by TTL expiry or by their owner disconnecting.
    #[serde(rename = "holdsReleased")]
    HoldsReleased { units: Vec<ReleasedUnit> },
}

impl ServerMessage {
    /// Build a `holdsReleased` batch from released unit ids.
    pub fn released<I>(unit_ids: I) -> Self
    where
        I: IntoIterator<Item = UnitId>,
    {
        Self::HoldsReleased {
            units: unit_ids.into_iter().map(ReleasedUnit::available).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

/// One entry of a snapshot. Connection ids are never exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HoldSnapshot {
    pub unit_id: UnitId,
    pub holder_identity: String,
    pub held_at: EpochMillis,
}

/// One entry of a `holdsReleased` batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedUnit {
    pub unit_id: UnitId,
    pub status: UnitStatus,
}

impl ReleasedUnit {
    pub fn available(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            status: UnitStatus::Available,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing and validation
// ---------------------------------------------------------------------------

/// Parse and validate an inbound client frame.
///
/// Returns [`CoreError::Validation`] for frames the coordinator must drop:
/// unparseable JSON, unknown types, a missing or empty unit id or status,
/// and hold intents without a holder name.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, CoreError> {
    let msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| CoreError::Validation(format!("Malformed client message: {e}")))?;

    if let ClientMessage::HoldOrReleaseIntent { unit } = &msg {
        validate_intent_unit(unit)?;
    }
    Ok(msg)
}

/// Check the fields the coordinator relies on for a hold/release intent.
pub fn validate_intent_unit(unit: &Unit) -> Result<(), CoreError> {
    if unit.id.trim().is_empty() {
        return Err(CoreError::Validation("Intent unit id must not be empty".into()));
    }
    if unit.is_pending() && unit.held_by.as_deref().map_or(true, |h| h.trim().is_empty()) {
        return Err(CoreError::Validation(format!(
            "Hold intent for '{}' carries no holder name",
            unit.id
        )));
    }
    Ok(())
}

/// Parse an outbound server frame (used by clients).
pub fn parse_server_message(text: &str) -> Result<ServerMessage, CoreError> {
    serde_json::from_str(text)
        .map_err(|e| CoreError::Validation(format!("Malformed server message: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn request_snapshot_has_only_a_type() {
        let json = serde_json::to_string(&ClientMessage::RequestSnapshot).unwrap();
        assert_eq!(json, r#"{"type":"requestSnapshot"}"#);
        assert_eq!(
            parse_client_message(&json).unwrap(),
            ClientMessage::RequestSnapshot
        );
    }

    #[test]
    fn hold_intent_parses_with_full_unit() {
        let raw = r#"{
            "type": "holdOrReleaseIntent",
            "unit": {
                "id": "U-101", "name": "101", "x": 12.5, "y": 40.0, "r": 23,
                "status": "pending", "heldBy": "Tiger42", "heldAt": 1000,
                "monthlyPrice": 4500, "dailyPrice": 150
            }
        }"#;

        let msg = parse_client_message(raw).unwrap();
        assert_matches!(msg, ClientMessage::HoldOrReleaseIntent { unit } => {
            assert_eq!(unit.id, "U-101");
            assert_eq!(unit.status, UnitStatus::Pending);
            assert_eq!(unit.held_by.as_deref(), Some("Tiger42"));
        });
    }

    #[test]
    fn intent_without_status_is_malformed() {
        let raw = r#"{"type":"holdOrReleaseIntent","unit":{"id":"U-1"}}"#;
        assert_matches!(parse_client_message(raw), Err(CoreError::Validation(_)));
    }

    #[test]
    fn intent_with_empty_id_is_malformed() {
        let raw = r#"{"type":"holdOrReleaseIntent","unit":{"id":"  ","status":"available"}}"#;
        let err = parse_client_message(raw).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn hold_intent_without_holder_is_malformed() {
        let raw = r#"{"type":"holdOrReleaseIntent","unit":{"id":"U-1","status":"pending"}}"#;
        let err = parse_client_message(raw).unwrap_err();
        assert!(err.to_string().contains("no holder"));
    }

    #[test]
    fn unknown_type_is_malformed() {
        assert_matches!(
            parse_client_message(r#"{"type":"testSendMessage"}"#),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn released_batch_marks_units_available() {
        let msg = ServerMessage::released(["U-205".to_string()]);
        let json: serde_json::Value =
            serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "holdsReleased");
        assert_eq!(
            json["units"],
            serde_json::json!([{"unitId": "U-205", "status": "available"}])
        );
    }

    #[test]
    fn snapshot_entries_omit_connection_ids() {
        let msg = ServerMessage::Snapshot {
            holds: vec![HoldSnapshot {
                unit_id: "U-1".into(),
                holder_identity: "Wolf7".into(),
                held_at: 42,
            }],
        };
        let json: serde_json::Value =
            serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        let entry = json["holds"][0].as_object().unwrap();
        assert_eq!(entry.len(), 3);
        assert_eq!(entry["holderIdentity"], "Wolf7");
        assert_eq!(parse_server_message(&msg.to_json().unwrap()).unwrap(), msg);
    }
}
