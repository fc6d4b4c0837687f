use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::model::notification::{Notification, NotificationKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub ticket_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub read: bool,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
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
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Notification> for ActiveModel {
    fn from(notification: &Notification) -> Self {
        Self {
            id: Set(notification.id),
            user_id: Set(notification.user_id.clone()),
            ticket_id: Set(notification.ticket_id),
            message: Set(notification.message.clone()),
            read: Set(notification.read),
            kind: Set(notification.kind),
            created_at: Set(notification.created_at),
        }
    }
}

impl From<Model> for Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            ticket_id: model.ticket_id,
            message: model.message,
            read: model.read,
            created_at: model.created_at,
            kind: model.kind,
        }
    }
}
