//! Unit model shared by the coordinator and the browser-side client.
//!
//! A [`Unit`] travels over the realtime channel as a full snapshot
//! (geometry, prices, status, holder) so that receivers can render it
//! without a second lookup. Only `status`, `held_by` and `held_at` matter
//! to the lock core; the rest is carried through untouched.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EpochMillis, UnitId};

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Status of a unit as seen on the map.
///
/// Every variant except [`UnitStatus::Pending`] is authoritative and comes
/// from the external rental system. `Pending` only ever exists inside the
/// realtime layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStatus {
    Available,
    SomeAvailable,
    Booked,
    Unavailable,
    Pending,
}

impl UnitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::SomeAvailable => "some-available",
            Self::Booked => "booked",
            Self::Unavailable => "unavailable",
            Self::Pending => "pending",
        }
    }

    /// Map a numeric matrix status code to a status for the given query kind.
    ///
    /// Monthly queries use a four-state vocabulary (`-1, 0, 1, 2`), daily
    /// queries a three-state one (`-1, 0, 2`).
    pub fn from_matrix_code(code: i32, kind: MatrixKind) -> Result<Self, CoreError> {
        match (kind, code) {
            (_, -1) => Ok(Self::Unavailable),
            (_, 0) => Ok(Self::Available),
            (MatrixKind::Monthly, 1) => Ok(Self::SomeAvailable),
            (_, 2) => Ok(Self::Booked),
            _ => Err(CoreError::Validation(format!(
                "Unknown {} matrix status code {code}",
                kind.as_str()
            ))),
        }
    }

    /// `true` for the terminal authoritative states that never accept a hold.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Booked | Self::Unavailable)
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which vocabulary a matrix response uses (`day = 0` is monthly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixKind {
    Monthly,
    Daily,
}

impl MatrixKind {
    pub fn for_day(day: u32) -> Self {
        if day == 0 {
            Self::Monthly
        } else {
            Self::Daily
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Daily => "daily",
        }
    }
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// Default circle radius used by the map when the matrix carries none.
pub const DEFAULT_RADIUS: f64 = 23.0;

/// A bookable spot on the site plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_radius")]
    pub r: f64,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_at: Option<EpochMillis>,
    #[serde(default)]
    pub monthly_price: f64,
    #[serde(default)]
    pub daily_price: f64,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS
}

impl Unit {
    /// A copy of this unit marked as held by `holder` at `held_at`.
    pub fn held(&self, holder: impl Into<String>, held_at: EpochMillis) -> Self {
        Self {
            status: UnitStatus::Pending,
            held_by: Some(holder.into()),
            held_at: Some(held_at),
            ..self.clone()
        }
    }

    /// A copy of this unit with the hold cleared and `status` restored.
    pub fn released(&self, status: UnitStatus) -> Self {
        Self {
            status,
            held_by: None,
            held_at: None,
            ..self.clone()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == UnitStatus::Pending
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_codes_use_four_states() {
        let kind = MatrixKind::Monthly;
        assert_eq!(UnitStatus::from_matrix_code(-1, kind).unwrap(), UnitStatus::Unavailable);
        assert_eq!(UnitStatus::from_matrix_code(0, kind).unwrap(), UnitStatus::Available);
        assert_eq!(UnitStatus::from_matrix_code(1, kind).unwrap(), UnitStatus::SomeAvailable);
        assert_eq!(UnitStatus::from_matrix_code(2, kind).unwrap(), UnitStatus::Booked);
    }

    #[test]
    fn daily_codes_have_no_partial_state() {
        let kind = MatrixKind::Daily;
        assert!(UnitStatus::from_matrix_code(1, kind).is_err());
        assert_eq!(UnitStatus::from_matrix_code(2, kind).unwrap(), UnitStatus::Booked);
    }

    #[test]
    fn matrix_kind_follows_day() {
        assert_eq!(MatrixKind::for_day(0), MatrixKind::Monthly);
        assert_eq!(MatrixKind::for_day(17), MatrixKind::Daily);
    }

    #[test]
    fn unit_wire_shape_is_camel_case() {
        let unit = Unit {
            id: "U-101".into(),
            name: "101".into(),
            x: 10.0,
            y: 20.0,
            r: DEFAULT_RADIUS,
            status: UnitStatus::Available,
            held_by: None,
            held_at: None,
            monthly_price: 4500.0,
            daily_price: 200.0,
        }
        .held("Tiger42", 1_700_000_000_000);

        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["heldBy"], "Tiger42");
        assert_eq!(json["heldAt"], 1_700_000_000_000_i64);
        assert_eq!(json["monthlyPrice"], 4500.0);
    }

    #[test]
    fn released_unit_drops_holder_fields() {
        let unit: Unit = serde_json::from_value(serde_json::json!({
            "id": "U-7",
            "status": "pending",
            "heldBy": "Wolf7",
            "heldAt": 5
        }))
        .unwrap();
        assert_eq!(unit.r, DEFAULT_RADIUS);

        let released = unit.released(UnitStatus::SomeAvailable);
        let json = serde_json::to_value(&released).unwrap();
        assert_eq!(json["status"], "some-available");
        assert!(json.get("heldBy").is_none());
        assert!(json.get("heldAt").is_none());
    }
}
