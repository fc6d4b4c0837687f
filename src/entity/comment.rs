use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::model::ticket::{Attachment, Comment};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub seq: i32,
    pub user_id: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ticket::Entity",
        from = "Column::TicketId",
        to = "super::ticket::Column::Id",
        on_delete = "Cascade"
    )]
    Ticket,

    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachment,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new_comment(
        ticket_id: Uuid,
        seq: i32,
        author_id: &str,
        content: &str,
        is_internal: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_id),
            seq: Set(seq),
            user_id: Set(author_id.to_string()),
            content: Set(content.to_string()),
            is_internal: Set(is_internal),
            created_at: Set(now),
            edited_at: Set(None),
        }
    }
}

impl Model {
    pub fn into_domain(self, attachments: Vec<Attachment>) -> Comment {
        Comment {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            is_internal: self.is_internal,
            created_at: self.created_at,
            edited_at: self.edited_at,
            attachments,
        }
    }
}
