use actix_web::{get, post, web, HttpResponse};
use uuid::Uuid;

use crate::model::auth::AuthUser;
use crate::model::global_error::AppError;
use crate::model::notification::{Notification, NotificationListResponse};
use crate::service::query::unread_count;
use crate::service::TicketStore;

#[utoipa::path(
    get,
    path = "/api/notifications",
    summary = "The caller's notifications, newest first",
    responses(
        (status = 200, description = "Notifications and unread count", body = NotificationListResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "notifications",
)]
#[get("/notifications")]
pub async fn list_notifications(
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let notifications = store.notifications_for(&auth_user.id).await?;
    let unread_count = unread_count(&notifications, &auth_user.id);
    Ok(HttpResponse::Ok().json(NotificationListResponse { notifications, unread_count }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    summary = "Mark a notification as read",
    params(("id", description = "Notification id")),
    responses(
        (status = 200, description = "The notification", body = Notification),
        (status = 404, description = "No such notification for this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "notifications",
)]
#[post("/notifications/{id}/read")]
pub async fn mark_read(
    path: web::Path<Uuid>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let notification = store
        .mark_notification_read(path.into_inner(), &auth_user.id)
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}
