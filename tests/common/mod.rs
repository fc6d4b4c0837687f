#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use helpdesk::migration::{Migrator, MigratorTrait};
use helpdesk::model::auth::{AuthUser, UserRole};
use helpdesk::model::notification::Notification;
use helpdesk::model::ticket::NewTicket;
use helpdesk::service::{NotificationRelay, NotificationRules, SlaPolicies, TicketStore};

pub const ADMIN: &str = "admin-1";
pub const OWNER: &str = "user-1";

/// Fresh in-memory schema. One connection, so every query sees the same
/// database.
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connects");
    Migrator::up(&db, None).await.expect("migrations apply");
    db
}

pub async fn store() -> TicketStore {
    TicketStore::new(memory_db().await, SlaPolicies::default(), NotificationRules::new(ADMIN))
}

pub fn owner() -> AuthUser {
    AuthUser::new(OWNER, UserRole::User)
}

pub fn stranger() -> AuthUser {
    AuthUser::new("user-2", UserRole::User)
}

pub fn support() -> AuthUser {
    AuthUser::new("support-1", UserRole::Support)
}

pub fn crash_on_login() -> NewTicket {
    NewTicket {
        owner_id: Some(OWNER.into()),
        ticket_type: Some("bug".into()),
        priority: Some("high".into()),
        subject: Some("Crash on login".into()),
        description: Some("x".repeat(60)),
        ..Default::default()
    }
}

/// Remembers every notification it is handed.
#[derive(Default)]
pub struct RecordingRelay {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingRelay {
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|n| n.message.clone()).collect()
    }
}

#[async_trait]
impl NotificationRelay for RecordingRelay {
    async fn relay(&self, notification: &Notification) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct FailingRelay;

#[async_trait]
impl NotificationRelay for FailingRelay {
    async fn relay(&self, _notification: &Notification) -> anyhow::Result<()> {
        Err(anyhow!("webhook unreachable"))
    }
}

/// Waits `0` before accepting each notification.
pub struct SlowRelay(pub Duration);

#[async_trait]
impl NotificationRelay for SlowRelay {
    async fn relay(&self, _notification: &Notification) -> anyhow::Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

pub async fn store_with_relay(relay: Arc<dyn NotificationRelay>) -> TicketStore {
    store().await.with_relay(relay)
}
