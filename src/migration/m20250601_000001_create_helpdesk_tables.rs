use sea_orm::{EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entity::{attachment, comment, notification, status_change, ticket, user};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Parents before children; foreign keys come from the entity relations.
fn create_in_order(schema: &Schema) -> Vec<TableCreateStatement> {
    vec![
        create(schema, user::Entity),
        create(schema, ticket::Entity),
        create(schema, comment::Entity),
        create(schema, attachment::Entity),
        create(schema, status_change::Entity),
        create(schema, notification::Entity),
    ]
}

fn create<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    schema.create_table_from_entity(entity).if_not_exists().to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());
        for statement in create_in_order(&schema) {
            manager.create_table(statement).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let tables = [
            Table::drop().table(notification::Entity).if_exists().to_owned(),
            Table::drop().table(status_change::Entity).if_exists().to_owned(),
            Table::drop().table(attachment::Entity).if_exists().to_owned(),
            Table::drop().table(comment::Entity).if_exists().to_owned(),
            Table::drop().table(ticket::Entity).if_exists().to_owned(),
            Table::drop().table(user::Entity).if_exists().to_owned(),
        ];
        for statement in tables {
            manager.drop_table(statement).await?;
        }
        Ok(())
    }
}
