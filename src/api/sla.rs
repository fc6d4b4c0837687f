use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::auth::AuthUser;
use crate::model::global_error::{AppError, ErrorCode};
use crate::service::TicketStore;

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub flagged: usize,
}

#[utoipa::path(
    post,
    path = "/api/sla/sweep",
    summary = "Flag tickets that missed their SLA",
    responses(
        (status = 200, description = "Number of tickets newly flagged", body = SweepResponse),
        (status = 403, description = "Caller is not staff"),
    ),
    security(("bearer_auth" = [])),
    tag = "sla",
)]
#[post("/sla/sweep")]
pub async fn sweep(
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    if !auth_user.is_staff() {
        return Err(AppError::new(ErrorCode::NotEnoughPermission));
    }
    let flagged = store.record_sla_breaches(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(SweepResponse { flagged }))
}
