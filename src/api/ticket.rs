use actix_web::{get, post, put, web, HttpResponse};
use uuid::Uuid;

use crate::model::auth::AuthUser;
use crate::model::global_error::{AppError, ErrorCode};
use crate::model::ticket::{
    AssignTicketRequest, AttachmentUpload, CreateTicketRequest, NewComment, StatusTransitionRequest, Ticket,
    TicketListResponse, TicketPatch,
};
use crate::service::comment::view_for;
use crate::service::query::{self, BoardColumn, TicketQuery, TicketStats};
use crate::service::{FileStorage, TicketStore};

/// Swaps client-claimed attachment metadata for what storage actually holds.
async fn verified(storage: &dyn FileStorage, uploads: Vec<AttachmentUpload>) -> Result<Vec<AttachmentUpload>, AppError> {
    let mut checked = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        checked.push(storage.verify(upload).await?);
    }
    Ok(checked)
}

fn require_staff(user: &AuthUser) -> Result<(), AppError> {
    if user.is_staff() {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::NotEnoughPermission))
    }
}

#[utoipa::path(
    post,
    path = "/api/tickets",
    summary = "Submit a ticket",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket created", body = Ticket),
        (status = 400, description = "One or more fields are invalid"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[post("/tickets")]
pub async fn create_ticket(
    body: web::Json<CreateTicketRequest>,
    store: web::Data<TicketStore>,
    storage: web::Data<dyn FileStorage>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let mut new_ticket = body.into_inner().into_new_ticket(auth_user.id.clone());
    new_ticket.attachments = verified(storage.get_ref(), new_ticket.attachments).await?;
    let ticket = store.create_ticket(new_ticket).await?;
    Ok(HttpResponse::Created().json(ticket))
}

#[utoipa::path(
    get,
    path = "/api/tickets",
    summary = "List tickets",
    description = "Non-staff callers only ever see their own tickets.",
    params(TicketQuery),
    responses(
        (status = 200, description = "Filtered and sorted tickets", body = TicketListResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[get("/tickets")]
pub async fn list_tickets(
    params: web::Query<TicketQuery>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let mut params = params.into_inner();
    if !auth_user.is_staff() {
        params.user_id = Some(auth_user.id.clone());
    }

    let tickets: Vec<Ticket> = store
        .list_tickets(&params)
        .await?
        .into_iter()
        .map(|t| view_for(t, &auth_user))
        .collect();

    Ok(HttpResponse::Ok().json(TicketListResponse { total: tickets.len(), tickets }))
}

#[utoipa::path(
    get,
    path = "/api/tickets/stats",
    summary = "Dashboard counters",
    responses(
        (status = 200, description = "Ticket counts", body = TicketStats),
        (status = 403, description = "Caller is not staff"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[get("/tickets/stats")]
pub async fn ticket_stats(
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    require_staff(&auth_user)?;
    let tickets = store.snapshot().await?;
    Ok(HttpResponse::Ok().json(query::summarize(&tickets)))
}

#[utoipa::path(
    get,
    path = "/api/tickets/board",
    summary = "Tickets grouped by status",
    responses(
        (status = 200, description = "One column per status", body = Vec<BoardColumn>),
        (status = 403, description = "Caller is not staff"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[get("/tickets/board")]
pub async fn ticket_board(
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    require_staff(&auth_user)?;
    let tickets = store.snapshot().await?;
    Ok(HttpResponse::Ok().json(query::board(&tickets)))
}

#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    summary = "Ticket detail",
    params(("id", description = "Ticket id")),
    responses(
        (status = 200, description = "The ticket", body = Ticket),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[get("/tickets/{id}")]
pub async fn get_ticket(
    path: web::Path<Uuid>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let ticket = store.ticket_for(path.into_inner(), &auth_user).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

#[utoipa::path(
    put,
    path = "/api/tickets/{id}",
    summary = "Edit ticket fields",
    description = "Status cannot be changed here; use the status endpoint.",
    params(("id", description = "Ticket id")),
    request_body = TicketPatch,
    responses(
        (status = 200, description = "Updated ticket", body = Ticket),
        (status = 400, description = "One or more fields are invalid"),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[put("/tickets/{id}")]
pub async fn update_ticket(
    path: web::Path<Uuid>,
    body: web::Json<TicketPatch>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let ticket = store
        .update_ticket(path.into_inner(), body.into_inner(), &auth_user)
        .await?;
    Ok(HttpResponse::Ok().json(view_for(ticket, &auth_user)))
}

#[utoipa::path(
    post,
    path = "/api/tickets/{id}/status",
    summary = "Move a ticket to another status",
    params(("id", description = "Ticket id")),
    request_body = StatusTransitionRequest,
    responses(
        (status = 200, description = "Ticket after the transition", body = Ticket),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[post("/tickets/{id}/status")]
pub async fn transition_status(
    path: web::Path<Uuid>,
    body: web::Json<StatusTransitionRequest>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    require_staff(&auth_user)?;
    let body = body.into_inner();
    let ticket = store
        .transition_status(path.into_inner(), body.status, &auth_user.id, body.comment)
        .await?;
    Ok(HttpResponse::Ok().json(ticket))
}

#[utoipa::path(
    post,
    path = "/api/tickets/{id}/assign",
    summary = "Assign a ticket to an agent",
    params(("id", description = "Ticket id")),
    request_body = AssignTicketRequest,
    responses(
        (status = 200, description = "Ticket after assignment", body = Ticket),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[post("/tickets/{id}/assign")]
pub async fn assign_ticket(
    path: web::Path<Uuid>,
    body: web::Json<AssignTicketRequest>,
    store: web::Data<TicketStore>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let ticket = store
        .assign_ticket(path.into_inner(), &body.agent_id, &auth_user)
        .await?;
    Ok(HttpResponse::Ok().json(ticket))
}

#[utoipa::path(
    post,
    path = "/api/tickets/{id}/comments",
    summary = "Comment on a ticket",
    params(("id", description = "Ticket id")),
    request_body = NewComment,
    responses(
        (status = 201, description = "Comment added", body = crate::model::ticket::Comment),
        (status = 400, description = "Empty comment"),
        (status = 403, description = "Caller may not comment here"),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[post("/tickets/{id}/comments")]
pub async fn add_comment(
    path: web::Path<Uuid>,
    body: web::Json<NewComment>,
    store: web::Data<TicketStore>,
    storage: web::Data<dyn FileStorage>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let mut new_comment = body.into_inner();
    new_comment.attachments = verified(storage.get_ref(), new_comment.attachments).await?;
    let comment = store
        .add_comment(path.into_inner(), &auth_user, new_comment)
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    post,
    path = "/api/tickets/{id}/attachments",
    summary = "Attach an uploaded file to a ticket",
    params(("id", description = "Ticket id")),
    request_body = AttachmentUpload,
    responses(
        (status = 201, description = "Attachment recorded", body = crate::model::ticket::Attachment),
        (status = 400, description = "Attachment rejected"),
        (status = 404, description = "No such ticket"),
    ),
    security(("bearer_auth" = [])),
    tag = "tickets",
)]
#[post("/tickets/{id}/attachments")]
pub async fn add_attachment(
    path: web::Path<Uuid>,
    body: web::Json<AttachmentUpload>,
    store: web::Data<TicketStore>,
    storage: web::Data<dyn FileStorage>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let upload = storage.verify(&body).await?;
    let attachment = store
        .add_attachment(path.into_inner(), upload, &auth_user)
        .await?;
    Ok(HttpResponse::Created().json(attachment))
}
