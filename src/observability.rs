use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roombook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roombook_query_duration_seconds";

// ── Booking engine ──────────────────────────────────────────────

/// Counter: bookings admitted.
pub const BOOKINGS_ADMITTED_TOTAL: &str = "roombook_bookings_admitted_total";

/// Counter: booking requests refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "roombook_bookings_rejected_total";

/// Counter: bookings cancelled.
pub const CANCELLATIONS_TOTAL: &str = "roombook_cancellations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roombook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roombook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roombook_connections_rejected_total";

/// Counter: statements refused because the login resolved to no actor.
pub const AUTH_FAILURES_TOTAL: &str = "roombook_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom(_) => "insert_room",
        Command::SelectRooms { .. } => "select_rooms",
        Command::UpdateRoomStatus { .. } => "update_room_status",
        Command::DeleteRoom { .. } => "delete_room",
        Command::InsertUser(_) => "insert_user",
        Command::SelectUsers { .. } => "select_users",
        Command::DeleteUser { .. } => "delete_user",
        Command::InsertBooking { .. } => "insert_booking",
        Command::SelectBookings(_) => "select_bookings",
        Command::SelectBookingDetails { .. } => "select_booking_details",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectSchedule { .. } => "select_schedule",
    }
}
