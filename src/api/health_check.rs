use actix_web::{get, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use tracing::warn;

/// Liveness plus a database round trip.
#[utoipa::path(
    get,
    path = "/health-check",
    responses(
        (status = 200, description = "Server and database are reachable", body = String),
        (status = 503, description = "Database is unreachable", body = String)
    ),
    tag = "health check",
)]
#[get("/health-check")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> impl Responder {
    match db.ping().await {
        Ok(()) => HttpResponse::Ok().body("ok"),
        Err(err) => {
            warn!(error = %err, "health check failed");
            HttpResponse::ServiceUnavailable().body("database unavailable")
        }
    }
}
