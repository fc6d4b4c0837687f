use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::auth::AuthUser;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::ticket::{Ticket, TicketStatus};

/// Something that happened to a ticket and may deserve a notice.
#[derive(Debug, Clone, Copy)]
pub enum TicketEvent<'a> {
    Created,
    StatusChanged { to: TicketStatus },
    CommentAdded { author: &'a AuthUser, is_internal: bool },
    Assigned { agent: &'a str },
    SlaBreached,
}

/// Decides who hears about a ticket event. Pure: persisting and relaying the
/// result is up to the caller.
#[derive(Debug, Clone)]
pub struct NotificationRules {
    admin_recipient: String,
}

impl NotificationRules {
    pub fn new(admin_recipient: impl Into<String>) -> Self {
        Self { admin_recipient: admin_recipient.into() }
    }

    pub fn admin_recipient(&self) -> &str {
        &self.admin_recipient
    }

    pub fn derive(&self, event: &TicketEvent<'_>, ticket: &Ticket, now: DateTime<Utc>) -> Option<Notification> {
        let (recipient, message, kind) = match *event {
            TicketEvent::Created => (
                self.admin_recipient.clone(),
                format!("New ticket submitted: \"{}\"", ticket.subject),
                NotificationKind::Assignment,
            ),
            TicketEvent::StatusChanged { to } => (
                ticket.user_id.clone(),
                format!("Your ticket \"{}\" has been marked as {to}.", ticket.subject),
                NotificationKind::StatusChange,
            ),
            TicketEvent::CommentAdded { is_internal: true, .. } => return None,
            TicketEvent::CommentAdded { author, .. } => {
                let recipient = if author.is_staff() {
                    ticket.user_id.clone()
                } else {
                    self.handler_of(ticket)
                };
                // no self-notices
                if recipient == author.id {
                    return None;
                }
                (
                    recipient,
                    format!("New comment on ticket \"{}\".", ticket.subject),
                    NotificationKind::Comment,
                )
            }
            TicketEvent::Assigned { agent } => (
                agent.to_string(),
                format!("Ticket \"{}\" has been assigned to you.", ticket.subject),
                NotificationKind::Assignment,
            ),
            TicketEvent::SlaBreached => (
                self.handler_of(ticket),
                format!("SLA breached on ticket \"{}\".", ticket.subject),
                NotificationKind::SlaBreach,
            ),
        };

        Some(Notification {
            id: Uuid::new_v4(),
            user_id: recipient,
            ticket_id: ticket.id,
            message,
            read: false,
            created_at: now,
            kind,
        })
    }

    fn handler_of(&self, ticket: &Ticket) -> String {
        ticket
            .assigned_to
            .clone()
            .unwrap_or_else(|| self.admin_recipient.clone())
    }
}
