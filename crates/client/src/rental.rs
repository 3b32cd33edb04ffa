//! External rental system: unit matrix and booking commit.
//!
//! The rental system is the source of truth for unit status. Its HTTP API
//! wraps every answer in a `{ success, data, message }` envelope.

use async_trait::async_trait;
use holdmap_core::error::CoreError;
use holdmap_core::unit::{MatrixKind, Unit, UnitStatus, DEFAULT_RADIUS};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Parameters of a unit matrix lookup. `day = 0` asks for the monthly view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixQuery {
    pub project_id: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl MatrixQuery {
    pub fn kind(&self) -> MatrixKind {
        MatrixKind::for_day(self.day)
    }
}

/// One row of the unit matrix as returned by the rental system.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixUnit {
    pub unit_id: String,
    pub unit_number: String,
    /// Numeric status code; vocabulary depends on the [`MatrixKind`].
    pub status: i32,
    #[serde(default)]
    pub status_desc: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default, rename = "m_price")]
    pub monthly_price: Option<f64>,
    #[serde(default, rename = "d_price")]
    pub daily_price: Option<f64>,
}

impl MatrixUnit {
    /// `false` for rows without usable plan coordinates.
    pub fn is_placeable(&self) -> bool {
        matches!((self.x, self.y), (Some(x), Some(y)) if x != 0.0 && y != 0.0)
    }

    pub fn into_unit(self, kind: MatrixKind) -> Result<Unit, CoreError> {
        let status = UnitStatus::from_matrix_code(self.status, kind)?;
        Ok(Unit {
            id: self.unit_id,
            name: self.unit_number,
            x: self.x.unwrap_or_default(),
            y: self.y.unwrap_or_default(),
            r: DEFAULT_RADIUS,
            status,
            held_by: None,
            held_at: None,
            monthly_price: self.monthly_price.unwrap_or_default(),
            daily_price: self.daily_price.unwrap_or_default(),
        })
    }
}

/// Convert matrix rows to units, dropping unplaceable rows and rows with an
/// unknown status code.
pub fn units_from_matrix(rows: Vec<MatrixUnit>, kind: MatrixKind) -> Vec<Unit> {
    rows.into_iter()
        .filter(MatrixUnit::is_placeable)
        .filter_map(|row| {
            let unit_id = row.unit_id.clone();
            match row.into_unit(kind) {
                Ok(unit) => Some(unit),
                Err(e) => {
                    tracing::warn!(unit_id = %unit_id, error = %e, "Skipping matrix row");
                    None
                }
            }
        })
        .collect()
}

/// A booking commit covering one or more units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub customer_id: String,
    pub project_id: String,
    /// `"monthly"` or `"daily"`.
    pub booking_type: MatrixKind,
    /// `YYYY-MM-DD`.
    pub booking_date: String,
    pub booking_month: u32,
    pub booking_year: i32,
    pub amount: f64,
    #[serde(rename = "daily_booking_units")]
    pub units: Vec<BookingUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingUnit {
    pub unit_id: String,
    /// `YYYY-MM-DD`.
    pub book_date: String,
    pub amount: f64,
}

impl BookingRequest {
    /// The unit ids this request books.
    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.unit_id.as_str())
    }
}

/// The rental system as seen by a booking session.
#[async_trait]
pub trait RentalBackend: Send + Sync {
    /// Fetch the unit matrix. Rows without plan coordinates are omitted.
    async fn fetch_unit_matrix(&self, query: &MatrixQuery) -> Result<Vec<Unit>, ClientError>;

    /// Commit a booking.
    async fn commit_booking(&self, request: &BookingRequest) -> Result<(), ClientError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// `{ success, data, message }` envelope used by the rental API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: String,
}

/// reqwest-backed [`RentalBackend`].
pub struct HttpRentalBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRentalBackend {
    /// * `base_url` - HTTP base URL of the rental API, e.g. `http://host:3001`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise return a
    /// [`ClientError::Backend`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Unwrap the envelope, turning `success: false` or missing data into
    /// [`ClientError::Rejected`].
    async fn parse_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        match envelope.data {
            Some(data) if envelope.success => Ok(data),
            _ => Err(ClientError::Rejected(envelope.message)),
        }
    }
}

#[async_trait]
impl RentalBackend for HttpRentalBackend {
    async fn fetch_unit_matrix(&self, query: &MatrixQuery) -> Result<Vec<Unit>, ClientError> {
        let response = self
            .client
            .post(format!("{}/api/unit-matrix", self.base_url))
            .json(query)
            .send()
            .await?;

        let rows: Vec<MatrixUnit> = Self::parse_envelope(response).await?;
        let total = rows.len();
        let units = units_from_matrix(rows, query.kind());
        tracing::debug!(
            project_id = %query.project_id,
            total,
            placed = units.len(),
            "Fetched unit matrix"
        );
        Ok(units)
    }

    async fn commit_booking(&self, request: &BookingRequest) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/api/book-unit", self.base_url))
            .json(&serde_json::json!({ "payload": request }))
            .send()
            .await?;

        let _: serde_json::Value = Self::parse_envelope(response).await?;
        tracing::info!(
            customer_id = %request.customer_id,
            count = request.units.len(),
            "Booking committed"
        );
        Ok(())
    }
}
