use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::model::ticket::{StatusChange, TicketStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status_changes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub seq: i32,
    pub from_status: TicketStatus,
    pub to_status: TicketStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub comment: Option<String>,
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

impl ActiveModel {
    pub fn record(
        ticket_id: Uuid,
        seq: i32,
        from: TicketStatus,
        to: TicketStatus,
        changed_by: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_id),
            seq: Set(seq),
            from_status: Set(from),
            to_status: Set(to),
            changed_by: Set(changed_by.to_string()),
            changed_at: Set(now),
            comment: Set(comment),
        }
    }
}

impl From<Model> for StatusChange {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            ticket_id: model.ticket_id,
            from_status: model.from_status,
            to_status: model.to_status,
            changed_by: model.changed_by,
            changed_at: model.changed_at,
            comment: model.comment,
        }
    }
}
