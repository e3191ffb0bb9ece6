use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{connection::SimpleConnection, pg::PgConnection};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// Liveness plus a round trip to the database. Needs no session.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.db().map(|mut conn| ping(&mut conn)) {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Ok(Err(err)) => {
            warn!(error = %err, "health check query failed");
            unavailable()
        }
        Err(_) => unavailable(),
    }
}

fn ping(conn: &mut PgConnection) -> diesel::QueryResult<()> {
    conn.batch_execute("SELECT 1")
}

fn unavailable() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable" })),
    )
}
