use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::model::ticket::{Attachment, AttachmentUpload};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub comment_id: Option<Uuid>,
    pub seq: i32,
    pub name: String,
    pub size: i64,
    pub mime_type: String,
    pub url: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
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

    #[sea_orm(
        belongs_to = "super::comment::Entity",
        from = "Column::CommentId",
        to = "super::comment::Column::Id",
        on_delete = "Cascade"
    )]
    Comment,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn from_upload(
        upload: &AttachmentUpload,
        ticket_id: Uuid,
        comment_id: Option<Uuid>,
        seq: i32,
        uploaded_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_id),
            comment_id: Set(comment_id),
            seq: Set(seq),
            name: Set(upload.name.clone()),
            size: Set(upload.size),
            mime_type: Set(upload.mime_type.clone()),
            url: Set(upload.url.clone()),
            uploaded_by: Set(uploaded_by.to_string()),
            uploaded_at: Set(now),
        }
    }
}

impl From<Model> for Attachment {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            size: model.size,
            mime_type: model.mime_type,
            url: model.url,
            uploaded_by: model.uploaded_by,
            uploaded_at: model.uploaded_at,
        }
    }
}
