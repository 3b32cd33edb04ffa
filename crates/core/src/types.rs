/// Units are addressed by the external system's unit id (e.g. `"U-101"`).
pub type UnitId = String;

/// Realtime connection ids are UUID v4 strings assigned on upgrade.
pub type ConnectionId = String;

/// Wall-clock instants on the wire and in the registry are epoch milliseconds.
pub type EpochMillis = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}
