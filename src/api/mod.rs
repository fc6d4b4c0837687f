pub mod auth;
pub mod docs;
pub mod health_check;
pub mod notification;
pub mod sla;
pub mod ticket;
pub mod upload;

use actix_web::web::{self, scope};

use crate::auth::AuthMiddleware;
use crate::service::storage::MAX_ATTACHMENT_BYTES;

pub use crate::api::auth::{get_me, login, refresh_token, register, set_role};

/// Request bodies may carry one attachment plus a little slack.
const PAYLOAD_LIMIT: usize = MAX_ATTACHMENT_BYTES as usize + 64 * 1024;

/// Public routes, then everything under `/api` behind bearer auth.
/// `/tickets/stats` and `/tickets/board` must register before
/// `/tickets/{id}`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check::health_check)
        .service(register)
        .service(login)
        .service(refresh_token)
        .service(
            scope("/api")
                .wrap(AuthMiddleware)
                .app_data(web::PayloadConfig::new(PAYLOAD_LIMIT))
                .service(get_me)
                .service(set_role)
                .service(ticket::create_ticket)
                .service(ticket::list_tickets)
                .service(ticket::ticket_stats)
                .service(ticket::ticket_board)
                .service(ticket::get_ticket)
                .service(ticket::update_ticket)
                .service(ticket::transition_status)
                .service(ticket::assign_ticket)
                .service(ticket::add_comment)
                .service(ticket::add_attachment)
                .service(upload::upload_file)
                .service(notification::list_notifications)
                .service(notification::mark_read)
                .service(sla::sweep),
        );
}
