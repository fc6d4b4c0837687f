use crate::model::auth::AuthUser;
use crate::model::ticket::Ticket;
use crate::service::error::TicketError;

/// Staff see every ticket; everyone else only their own.
pub fn can_view(ticket: &Ticket, viewer: &AuthUser) -> bool {
    viewer.is_staff() || ticket.user_id == viewer.id
}

pub fn authorize_comment(owner_id: &str, author: &AuthUser, is_internal: bool) -> Result<(), TicketError> {
    if author.is_staff() {
        return Ok(());
    }
    if owner_id != author.id {
        return Err(TicketError::Forbidden("only the owner or staff may comment on a ticket"));
    }
    if is_internal {
        return Err(TicketError::Forbidden("internal comments are reserved for staff"));
    }
    Ok(())
}

/// The ticket as `viewer` may see it: internal comments removed for non-staff.
pub fn view_for(mut ticket: Ticket, viewer: &AuthUser) -> Ticket {
    if !viewer.is_staff() {
        ticket.comments.retain(|c| !c.is_internal);
    }
    ticket
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::model::auth::UserRole;
    use crate::model::ticket::{Comment, TicketPriority, TicketStatus, TicketType};

    fn comment(content: &str, is_internal: bool) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            user_id: "agent-1".into(),
            content: content.into(),
            is_internal,
            created_at: Utc::now(),
            edited_at: None,
            attachments: vec![],
        }
    }

    fn ticket_with_comments() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            assigned_to: Some("agent-1".into()),
            department: None,
            ticket_type: TicketType::TechnicalSupport,
            priority: TicketPriority::Medium,
            status: TicketStatus::InProgress,
            subject: "VPN drops".into(),
            description: "v".repeat(60),
            attachments: vec![],
            comments: vec![comment("checking logs", false), comment("user is on old client", true)],
            status_history: vec![],
            sla: None,
            tags: vec![],
            custom_fields: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            first_response_at: None,
        }
    }

    #[test]
    fn internal_comments_are_hidden_from_non_staff() {
        let ticket = ticket_with_comments();
        let owner = AuthUser::new("user-1", UserRole::User);
        let supervisor = AuthUser::new("sup-1", UserRole::Supervisor);

        let owner_view = view_for(ticket.clone(), &owner);
        assert_eq!(owner_view.comments.len(), 1);
        assert!(owner_view.comments.iter().all(|c| !c.is_internal));
        assert_eq!(view_for(ticket, &supervisor).comments.len(), 2);
    }

    #[test]
    fn only_owner_and_staff_may_view() {
        let ticket = ticket_with_comments();
        assert!(can_view(&ticket, &AuthUser::new("user-1", UserRole::User)));
        assert!(can_view(&ticket, &AuthUser::new("agent-9", UserRole::Support)));
        assert!(!can_view(&ticket, &AuthUser::new("user-2", UserRole::User)));
    }

    #[test]
    fn comment_permissions() {
        let owner = AuthUser::new("user-1", UserRole::User);
        let stranger = AuthUser::new("user-2", UserRole::User);
        let admin = AuthUser::new("admin-1", UserRole::Admin);

        assert!(authorize_comment("user-1", &owner, false).is_ok());
        assert!(matches!(authorize_comment("user-1", &owner, true), Err(TicketError::Forbidden(_))));
        assert!(matches!(authorize_comment("user-1", &stranger, false), Err(TicketError::Forbidden(_))));
        assert!(authorize_comment("user-1", &admin, true).is_ok());
    }
}
