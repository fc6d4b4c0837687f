use actix_web::{post, web, HttpRequest, HttpResponse};
use bytes::Bytes;

use crate::model::auth::AuthUser;
use crate::model::global_error::AppError;
use crate::model::ticket::AttachmentUpload;
use crate::service::storage::FileStorage;

#[derive(Debug, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Original file name.
    pub name: String,
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    summary = "Store a file for later attachment",
    description = "The raw request body is the file. Files over 10 MiB are rejected.",
    params(UploadParams),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored; reference it from a ticket or comment", body = AttachmentUpload),
        (status = 400, description = "Empty, unnamed or oversized file"),
    ),
    security(("bearer_auth" = [])),
    tag = "uploads",
)]
#[post("/uploads")]
pub async fn upload_file(
    req: HttpRequest,
    params: web::Query<UploadParams>,
    body: Bytes,
    storage: web::Data<dyn FileStorage>,
    _auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let mime_type = req
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let stored = storage.store(&params.name, mime_type, body).await?;
    Ok(HttpResponse::Created().json(stored))
}
