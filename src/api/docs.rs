use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::{auth, health_check, notification, sla, ticket, upload};
use crate::model::auth::{AuthResponse, LoginRequest, RegisterRequest, RoleUpdateRequest, UserResponse, UserRole};
use crate::model::global_error::ValidationFieldError;
use crate::model::notification::{Notification, NotificationKind, NotificationListResponse};
use crate::model::ticket::{
    AssignTicketRequest, Attachment, AttachmentUpload, Comment, CreateTicketRequest, NewComment, StatusChange,
    StatusTransitionRequest, Ticket, TicketListResponse, TicketPatch, TicketPriority, TicketSla, TicketStatus,
    TicketType,
};
use crate::service::query::{BoardColumn, SortOrder, TicketStats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Helpdesk API",
        version = "0.1.0",
        description = "Ticket submission, triage and notification service"
    ),
    paths(
        health_check::health_check,
        auth::register,
        auth::login,
        auth::refresh_token,
        auth::get_me,
        auth::set_role,
        ticket::create_ticket,
        ticket::list_tickets,
        ticket::ticket_stats,
        ticket::ticket_board,
        ticket::get_ticket,
        ticket::update_ticket,
        ticket::transition_status,
        ticket::assign_ticket,
        ticket::add_comment,
        ticket::add_attachment,
        upload::upload_file,
        notification::list_notifications,
        notification::mark_read,
        sla::sweep,
    ),
    components(
        schemas(
            Ticket, TicketStatus, TicketPriority, TicketType, TicketSla, Attachment, AttachmentUpload,
            Comment, StatusChange, CreateTicketRequest, TicketPatch, StatusTransitionRequest,
            AssignTicketRequest, NewComment, TicketListResponse, TicketStats, BoardColumn, SortOrder,
            Notification, NotificationKind, NotificationListResponse,
            RegisterRequest, LoginRequest, AuthResponse, UserResponse, UserRole, RoleUpdateRequest,
            auth::RefreshRequest, sla::SweepResponse, ValidationFieldError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health check", description = "Liveness"),
        (name = "auth", description = "Accounts and tokens"),
        (name = "tickets", description = "Ticket lifecycle"),
        (name = "uploads", description = "File storage"),
        (name = "notifications", description = "Per-user notices"),
        (name = "sla", description = "Service-level deadlines"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/api/tickets", "/api/tickets/{id}/status", "/api/notifications/{id}/read", "/api/sla/sweep"] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer_auth"));
    }
}
