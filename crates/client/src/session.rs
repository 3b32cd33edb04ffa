//! Booking session: one tab's view of one plan.
//!
//! [`BookingSession`] wires the rental backend, the realtime channel and
//! the [`ReconcileEngine`] together. It owns the engine; callers feed it
//! realtime events with [`BookingSession::handle_event`] and drive user
//! actions through [`BookingSession::click`] and [`BookingSession::commit`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use holdmap_core::error::CoreError;
use holdmap_core::types::now_millis;
use holdmap_core::unit::{MatrixKind, Unit, UnitStatus};

use crate::adapter::RealtimeAdapter;
use crate::error::ClientError;
use crate::events::RealtimeEvent;
use crate::identity::resolve_display_name;
use crate::reconcile::{ClickOutcome, Notice, PartialPolicy, ReconcileEngine, RenderedUnit};
use crate::rental::{BookingRequest, BookingUnit, MatrixQuery, RentalBackend};

/// Outbound side of the realtime channel.
#[async_trait]
pub trait HoldChannel: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn send_intent(&self, unit: Unit) -> Result<(), ClientError>;
    async fn request_snapshot(&self) -> Result<(), ClientError>;
}

#[async_trait]
impl HoldChannel for RealtimeAdapter {
    async fn is_connected(&self) -> bool {
        RealtimeAdapter::is_connected(self).await
    }

    async fn send_intent(&self, unit: Unit) -> Result<(), ClientError> {
        RealtimeAdapter::send_intent(self, unit).await
    }

    async fn request_snapshot(&self) -> Result<(), ClientError> {
        RealtimeAdapter::request_snapshot(self).await
    }
}

pub struct BookingSession {
    backend: Arc<dyn RentalBackend>,
    channel: Arc<dyn HoldChannel>,
    engine: ReconcileEngine,
    query: Option<MatrixQuery>,
}

impl BookingSession {
    /// `display_name` comes from login; a generated name is used when absent.
    pub fn new(
        backend: Arc<dyn RentalBackend>,
        channel: Arc<dyn HoldChannel>,
        display_name: Option<&str>,
        policy: PartialPolicy,
    ) -> Self {
        let name = resolve_display_name(display_name);
        tracing::debug!(display_name = %name, "Booking session created");
        Self {
            backend,
            channel,
            engine: ReconcileEngine::new(name, policy),
            query: None,
        }
    }

    /// Holder identity shown to other users.
    pub fn display_name(&self) -> &str {
        self.engine.identity()
    }

    pub fn engine(&self) -> &ReconcileEngine {
        &self.engine
    }

    pub fn query(&self) -> Option<&MatrixQuery> {
        self.query.as_ref()
    }

    pub fn render(&self) -> Vec<RenderedUnit> {
        self.engine.render()
    }

    /// Fetch the matrix for `query`, apply it, then ask for a hold snapshot.
    ///
    /// A failed fetch leaves the engine untouched.
    pub async fn refresh(&mut self, query: MatrixQuery) -> Result<Vec<Notice>, ClientError> {
        let units = self.backend.fetch_unit_matrix(&query).await?;
        let notices = self.engine.apply_matrix(units, query.kind());
        self.query = Some(query);

        match self.channel.request_snapshot().await {
            Ok(()) => {}
            // The adapter asks for a snapshot itself on every connect.
            Err(ClientError::NotConnected) => {
                tracing::debug!("Realtime channel down, snapshot deferred to reconnect");
            }
            Err(e) => return Err(e),
        }
        Ok(notices)
    }

    pub fn handle_event(&mut self, event: RealtimeEvent) -> Vec<Notice> {
        match event {
            RealtimeEvent::Connected => {
                self.engine.on_connected();
                Vec::new()
            }
            RealtimeEvent::Disconnected => Vec::new(),
            RealtimeEvent::Snapshot(holds) => self.engine.apply_snapshot(holds),
            RealtimeEvent::UnitUpdated(unit) => self.engine.apply_unit_update(unit),
            RealtimeEvent::HoldsReleased(units) => self.engine.apply_released(units),
        }
    }

    /// Toggle a hold and send the resulting intent.
    ///
    /// Fails with [`ClientError::NotConnected`] without touching local
    /// state while the realtime channel is down.
    pub async fn click(&mut self, unit_id: &str) -> Result<ClickOutcome, ClientError> {
        if !self.channel.is_connected().await {
            return Err(ClientError::NotConnected);
        }

        let outcome = self.engine.click(unit_id, now_millis());
        match &outcome {
            ClickOutcome::Hold(unit) => {
                if let Err(e) = self.channel.send_intent(unit.clone()).await {
                    self.engine.discard_optimistic(unit_id);
                    return Err(e);
                }
            }
            // The server drops a connection's holds when it goes away.
            ClickOutcome::Release(unit) => {
                if let Err(e) = self.channel.send_intent(unit.clone()).await {
                    tracing::debug!(unit_id, error = %e, "Release intent not sent");
                }
            }
            ClickOutcome::Blocked(reason) => {
                tracing::debug!(unit_id, ?reason, "Click blocked");
            }
        }
        Ok(outcome)
    }

    /// Build a booking for the current selection.
    ///
    /// Each unit is booked for the queried date (the first of the month for
    /// the monthly view) at its monthly or daily price.
    pub fn booking_request(
        &self,
        customer_id: &str,
        booking_date: NaiveDate,
    ) -> Result<BookingRequest, ClientError> {
        let query = self
            .query
            .as_ref()
            .ok_or_else(|| CoreError::Validation("No unit matrix loaded".into()))?;
        let selection = self.engine.selection();
        if selection.is_empty() {
            return Err(CoreError::Validation("No units selected".into()).into());
        }

        let kind = query.kind();
        let book_date = NaiveDate::from_ymd_opt(query.year, query.month, query.day.max(1))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid matrix date {}-{}-{}",
                    query.year, query.month, query.day
                ))
            })?
            .format("%Y-%m-%d")
            .to_string();

        let units: Vec<BookingUnit> = selection
            .iter()
            .map(|unit| BookingUnit {
                unit_id: unit.id.clone(),
                book_date: book_date.clone(),
                amount: match kind {
                    MatrixKind::Monthly => unit.monthly_price,
                    MatrixKind::Daily => unit.daily_price,
                },
            })
            .collect();

        Ok(BookingRequest {
            customer_id: customer_id.to_string(),
            project_id: query.project_id.clone(),
            booking_type: kind,
            booking_date: booking_date.format("%Y-%m-%d").to_string(),
            booking_month: booking_date.month(),
            booking_year: booking_date.year(),
            amount: units.iter().map(|u| u.amount).sum(),
            units,
        })
    }

    /// Commit a booking.
    ///
    /// On success local holds are cleared, the committed units are released
    /// as `booked` so peers close them, any other selected unit is released
    /// with its matrix status, and the matrix is fetched again.
    /// On failure nothing changes and the holds stay for a retry.
    pub async fn commit(&mut self, request: &BookingRequest) -> Result<Vec<Unit>, ClientError> {
        self.backend.commit_booking(request).await?;

        let booked: Vec<&str> = request.unit_ids().collect();
        let cleared = self.engine.clear_selection();

        for unit in &cleared {
            // Selected units left out of the request go back to their matrix status.
            let status = if booked.contains(&unit.id.as_str()) {
                UnitStatus::Booked
            } else {
                unit.status
            };
            if let Err(e) = self.channel.send_intent(unit.released(status)).await {
                tracing::warn!(unit_id = %unit.id, status = status.as_str(), error = %e, "Failed to announce released unit");
            }
        }

        if let Some(query) = self.query.clone() {
            if let Err(e) = self.refresh(query).await {
                tracing::warn!(error = %e, "Matrix refresh after commit failed");
            }
        }

        Ok(cleared)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
