use sea_orm_migration::prelude::*;

use crate::entity::{notification, ticket};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_user_id")
                    .table(ticket::Entity)
                    .col(ticket::Column::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_assigned_to")
                    .table(ticket::Entity)
                    .col(ticket::Column::AssignedTo)
                    .to_owned(),
            )
            .await?;

        // notification lists are per recipient, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_created")
                    .table(notification::Entity)
                    .col(notification::Column::UserId)
                    .col(notification::Column::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table) in [
            ("idx_notifications_user_created", Alias::new("notifications")),
            ("idx_tickets_assigned_to", Alias::new("tickets")),
            ("idx_tickets_user_id", Alias::new("tickets")),
        ] {
            manager
                .drop_index(Index::drop().name(name).table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}
