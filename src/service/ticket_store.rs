use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entity::base_time::ActiveModelTimeBehavior;
use crate::entity::{attachment, comment, notification, status_change, ticket};
use crate::model::auth::AuthUser;
use crate::model::notification::Notification;
use crate::model::ticket::{
    Attachment, AttachmentUpload, Comment, NewComment, NewTicket, StatusChange, Ticket, TicketPatch,
    TicketSla, TicketStatus,
};
use crate::service::comment::{authorize_comment, can_view, view_for};
use crate::service::error::TicketError;
use crate::service::notification::{NotificationRules, TicketEvent};
use crate::service::query::{self, TicketQuery};
use crate::service::relay::NotificationRelay;
use crate::service::sla::{self, Deadlines, SlaPolicies};
use crate::service::validate;

/// One async mutex per ticket id. Mutations take it before opening their
/// transaction, so racing writers on one ticket queue up instead of
/// interleaving. An entry lives only while someone holds or waits on it.
#[derive(Default)]
struct TicketLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl TicketLocks {
    async fn acquire(&self, id: Uuid) -> TicketLock<'_> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        TicketLock { locks: self, id, guard: Some(lock.lock_owned().await) }
    }

    fn prune(&self, id: Uuid) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct TicketLock<'a> {
    locks: &'a TicketLocks,
    id: Uuid,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for TicketLock<'_> {
    fn drop(&mut self) {
        // the owned guard keeps one reference alive until it is released
        drop(self.guard.take());
        self.locks.prune(self.id);
    }
}

/// Authoritative ticket and notification state.
///
/// Each mutation writes the ticket, its child rows and the notification it
/// causes in one transaction. Relaying the notification outward happens
/// after commit and never affects the stored outcome.
pub struct TicketStore {
    db: DatabaseConnection,
    sla: SlaPolicies,
    rules: NotificationRules,
    relay: Option<Arc<dyn NotificationRelay>>,
    locks: TicketLocks,
}

impl TicketStore {
    pub fn new(db: DatabaseConnection, sla: SlaPolicies, rules: NotificationRules) -> Self {
        Self { db, sla, rules, relay: None, locks: TicketLocks::default() }
    }

    pub fn with_relay(mut self, relay: Arc<dyn NotificationRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    #[instrument(skip(self, new), fields(owner = new.owner_id.as_deref().unwrap_or_default()))]
    pub async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, TicketError> {
        let valid = validate::new_ticket(&new)?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let deadlines = self.sla.deadlines(valid.priority, now);

        let txn = self.db.begin().await?;

        ticket::ActiveModel {
            id: Set(id),
            user_id: Set(valid.owner_id.clone()),
            assigned_to: Set(None),
            department: Set(valid.department),
            ticket_type: Set(valid.ticket_type),
            priority: Set(valid.priority),
            status: Set(TicketStatus::New),
            subject: Set(valid.subject),
            description: Set(valid.description),
            tags: Set(Some(Value::from(valid.tags))),
            custom_fields: Set(valid.custom_fields),
            response_deadline: Set(deadlines.map(|d| d.response)),
            resolution_deadline: Set(deadlines.map(|d| d.resolution)),
            sla_breached: Set(false),
            breach_notified: Set(false),
            first_response_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            closed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for (seq, upload) in new.attachments.iter().enumerate() {
            attachment::ActiveModel::from_upload(upload, id, None, seq as i32, &valid.owner_id, now)
                .insert(&txn)
                .await?;
        }

        let ticket = load_ticket(&txn, id, now).await?;
        let notice = self.record_notification(&txn, &TicketEvent::Created, &ticket, now).await?;
        txn.commit().await?;

        info!(ticket_id = %id, priority = %ticket.priority, "ticket created");
        self.relay(notice).await;
        Ok(ticket)
    }

    pub async fn get_ticket(&self, id: Uuid) -> Result<Ticket, TicketError> {
        load_ticket(&self.db, id, Utc::now()).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_ticket(&self, id: Uuid, patch: TicketPatch, actor: &AuthUser) -> Result<Ticket, TicketError> {
        let valid = validate::patch(&patch)?;

        let guard = self.locks.acquire(id).await;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = find_ticket_row(&txn, id).await?;
        if !(actor.is_staff() || model.user_id == actor.id) {
            return Err(TicketError::Forbidden("only the owner or staff may edit a ticket"));
        }

        let mut active: ticket::ActiveModel = model.clone().into();
        if let Some(department) = valid.department {
            active.department = Set(Some(department).filter(|d| !d.trim().is_empty()));
        }
        if let Some(ticket_type) = valid.ticket_type {
            active.ticket_type = Set(ticket_type);
        }
        if let Some(subject) = valid.subject {
            active.subject = Set(subject);
        }
        if let Some(description) = valid.description {
            active.description = Set(description);
        }
        if let Some(tags) = valid.tags {
            active.tags = Set(Some(Value::from(tags)));
        }
        if let Some(custom_fields) = valid.custom_fields {
            active.custom_fields = Set(Some(custom_fields));
        }
        if let Some(priority) = valid.priority.filter(|p| *p != model.priority) {
            // deadlines always count from submission
            let deadlines = self.sla.deadlines(priority, model.created_at);
            active.priority = Set(priority);
            active.response_deadline = Set(deadlines.map(|d| d.response));
            active.resolution_deadline = Set(deadlines.map(|d| d.resolution));
        }
        active.touch(&model, now);
        active.update(&txn).await?;

        let ticket = load_ticket(&txn, id, now).await?;
        txn.commit().await?;
        drop(guard);

        info!(ticket_id = %id, "ticket updated");
        Ok(ticket)
    }

    /// Any status may follow any other. Each call appends exactly one
    /// history entry and one notice to the owner.
    #[instrument(skip(self, note))]
    pub async fn transition_status(
        &self,
        id: Uuid,
        to: TicketStatus,
        changed_by: &str,
        note: Option<String>,
    ) -> Result<Ticket, TicketError> {
        let guard = self.locks.acquire(id).await;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = find_ticket_row(&txn, id).await?;
        let from = model.status;

        let seq = status_change::Entity::find()
            .filter(status_change::Column::TicketId.eq(id))
            .count(&txn)
            .await? as i32;
        status_change::ActiveModel::record(id, seq, from, to, changed_by, note, now)
            .insert(&txn)
            .await?;

        let first_response_at = match model.first_response_at {
            None if from == TicketStatus::New && to != TicketStatus::New => Some(now),
            existing => existing,
        };

        let mut active: ticket::ActiveModel = model.clone().into();
        active.status = Set(to);
        active.closed_at = Set(match (from, to) {
            (TicketStatus::Closed, TicketStatus::Closed) => model.closed_at,
            (_, TicketStatus::Closed) => Some(now),
            _ => None,
        });
        active.first_response_at = Set(first_response_at);
        if to.is_terminal() && !from.is_terminal() {
            // freeze the breach state as of now
            let breached = deadlines_of(&model)
                .is_some_and(|d| sla::is_breached(&d, first_response_at, now));
            active.sla_breached = Set(model.sla_breached || breached);
        }
        active.touch(&model, now);
        active.update(&txn).await?;

        let ticket = load_ticket(&txn, id, now).await?;
        let notice = self
            .record_notification(&txn, &TicketEvent::StatusChanged { to }, &ticket, now)
            .await?;
        txn.commit().await?;
        drop(guard);

        info!(ticket_id = %id, %from, %to, "ticket status changed");
        self.relay(notice).await;
        Ok(ticket)
    }

    #[instrument(skip(self))]
    pub async fn assign_ticket(&self, id: Uuid, agent_id: &str, actor: &AuthUser) -> Result<Ticket, TicketError> {
        if !actor.is_staff() {
            return Err(TicketError::Forbidden("only staff may assign tickets"));
        }
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return Err(TicketError::invalid("agentId", "agent id is required"));
        }

        let guard = self.locks.acquire(id).await;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = find_ticket_row(&txn, id).await?;
        let mut active: ticket::ActiveModel = model.clone().into();
        active.assigned_to = Set(Some(agent_id.to_string()));
        active.touch(&model, now);
        active.update(&txn).await?;

        let ticket = load_ticket(&txn, id, now).await?;
        let notice = self
            .record_notification(&txn, &TicketEvent::Assigned { agent: agent_id }, &ticket, now)
            .await?;
        txn.commit().await?;
        drop(guard);

        info!(ticket_id = %id, agent_id, "ticket assigned");
        self.relay(notice).await;
        Ok(ticket)
    }

    #[instrument(skip(self, new), fields(author = %author.id, internal = new.is_internal))]
    pub async fn add_comment(&self, ticket_id: Uuid, author: &AuthUser, new: NewComment) -> Result<Comment, TicketError> {
        validate::comment_content(&new.content)?;
        for upload in &new.attachments {
            validate::attachment(upload)?;
        }

        let guard = self.locks.acquire(ticket_id).await;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = find_ticket_row(&txn, ticket_id).await?;
        authorize_comment(&model.user_id, author, new.is_internal)?;

        let seq = comment::Entity::find()
            .filter(comment::Column::TicketId.eq(ticket_id))
            .count(&txn)
            .await? as i32;
        let row = comment::ActiveModel::new_comment(ticket_id, seq, &author.id, &new.content, new.is_internal, now)
            .insert(&txn)
            .await?;

        let mut attachments = Vec::with_capacity(new.attachments.len());
        for (seq, upload) in new.attachments.iter().enumerate() {
            let stored = attachment::ActiveModel::from_upload(upload, ticket_id, Some(row.id), seq as i32, &author.id, now)
                .insert(&txn)
                .await?;
            attachments.push(Attachment::from(stored));
        }

        let mut active: ticket::ActiveModel = model.clone().into();
        if author.is_staff() && !new.is_internal && model.first_response_at.is_none() {
            active.first_response_at = Set(Some(now));
        }
        active.touch(&model, now);
        active.update(&txn).await?;

        let ticket = load_ticket(&txn, ticket_id, now).await?;
        let event = TicketEvent::CommentAdded { author, is_internal: new.is_internal };
        let notice = self.record_notification(&txn, &event, &ticket, now).await?;
        txn.commit().await?;
        drop(guard);

        info!(%ticket_id, comment_id = %row.id, "comment added");
        self.relay(notice).await;
        Ok(row.into_domain(attachments))
    }

    /// Attaches an already stored file to the ticket itself. No notice.
    #[instrument(skip(self, upload), fields(name = %upload.name))]
    pub async fn add_attachment(
        &self,
        id: Uuid,
        upload: AttachmentUpload,
        uploader: &AuthUser,
    ) -> Result<Attachment, TicketError> {
        validate::attachment(&upload)?;

        let guard = self.locks.acquire(id).await;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = find_ticket_row(&txn, id).await?;
        if !(uploader.is_staff() || model.user_id == uploader.id) {
            return Err(TicketError::Forbidden("only the owner or staff may attach files"));
        }

        let seq = attachment::Entity::find()
            .filter(attachment::Column::TicketId.eq(id))
            .filter(attachment::Column::CommentId.is_null())
            .count(&txn)
            .await? as i32;
        let stored = attachment::ActiveModel::from_upload(&upload, id, None, seq, &uploader.id, now)
            .insert(&txn)
            .await?;

        let mut active: ticket::ActiveModel = model.clone().into();
        active.touch(&model, now);
        active.update(&txn).await?;
        txn.commit().await?;
        drop(guard);

        info!(ticket_id = %id, attachment_id = %stored.id, "attachment added");
        Ok(stored.into())
    }

    /// Every ticket, oldest first, fully assembled.
    pub async fn snapshot(&self) -> Result<Vec<Ticket>, TicketError> {
        let now = Utc::now();
        let rows = ticket::Entity::find()
            .order_by_asc(ticket::Column::CreatedAt)
            .all(&self.db)
            .await?;
        let comments = comment::Entity::find()
            .order_by_asc(comment::Column::Seq)
            .all(&self.db)
            .await?;
        let attachments = attachment::Entity::find()
            .order_by_asc(attachment::Column::Seq)
            .all(&self.db)
            .await?;
        let history = status_change::Entity::find()
            .order_by_asc(status_change::Column::Seq)
            .all(&self.db)
            .await?;

        let mut comments = group_by_ticket(comments, |c| c.ticket_id);
        let mut attachments = group_by_ticket(attachments, |a| a.ticket_id);
        let mut history = group_by_ticket(history, |h| h.ticket_id);

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                assemble(
                    row,
                    comments.remove(&id).unwrap_or_default(),
                    attachments.remove(&id).unwrap_or_default(),
                    history.remove(&id).unwrap_or_default(),
                    now,
                )
            })
            .collect())
    }

    pub async fn list_tickets(&self, params: &TicketQuery) -> Result<Vec<Ticket>, TicketError> {
        let tickets = self.snapshot().await?;
        Ok(query::query(&tickets, params).into_iter().cloned().collect())
    }

    /// Only the owner, or staff, may read a ticket; non-staff never see
    /// internal comments.
    pub async fn ticket_for(&self, id: Uuid, viewer: &AuthUser) -> Result<Ticket, TicketError> {
        let ticket = self.get_ticket(id).await?;
        if !can_view(&ticket, viewer) {
            // existence stays hidden from other users
            return Err(TicketError::ticket_not_found(id));
        }
        Ok(view_for(ticket, viewer))
    }

    /// Newest first.
    pub async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, TicketError> {
        let rows = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    /// A notification addressed to someone else reads as not found.
    #[instrument(skip(self))]
    pub async fn mark_notification_read(&self, id: Uuid, user_id: &str) -> Result<Notification, TicketError> {
        let row = notification::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| TicketError::notification_not_found(id))?;
        if row.read {
            return Ok(row.into());
        }

        let mut active: notification::ActiveModel = row.into();
        active.read = Set(true);
        let row = active.update(&self.db).await?;
        Ok(row.into())
    }

    /// Flags open tickets whose deadlines have passed and notifies whoever
    /// handles each of them, once per ticket. Returns how many were flagged.
    #[instrument(skip(self))]
    pub async fn record_sla_breaches(&self, now: DateTime<Utc>) -> Result<usize, TicketError> {
        let candidates = ticket::Entity::find()
            .filter(ticket::Column::BreachNotified.eq(false))
            .all(&self.db)
            .await?;

        let mut flagged = 0;
        for candidate in candidates.into_iter().filter(|row| breach_unreported(row, now)) {
            let id = candidate.id;
            let guard = self.locks.acquire(id).await;
            let txn = self.db.begin().await?;

            // re-read under the lock; the row may have moved on since the scan
            let model = find_ticket_row(&txn, id).await?;
            if !breach_unreported(&model, now) {
                txn.rollback().await?;
                continue;
            }

            let mut active: ticket::ActiveModel = model.into();
            active.sla_breached = Set(true);
            active.breach_notified = Set(true);
            active.update(&txn).await?;

            let ticket = load_ticket(&txn, id, now).await?;
            let notice = self
                .record_notification(&txn, &TicketEvent::SlaBreached, &ticket, now)
                .await?;
            txn.commit().await?;
            drop(guard);

            warn!(ticket_id = %id, "sla breached");
            self.relay(notice).await;
            flagged += 1;
        }
        Ok(flagged)
    }

    async fn record_notification<C: ConnectionTrait>(
        &self,
        conn: &C,
        event: &TicketEvent<'_>,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, TicketError> {
        let Some(notice) = self.rules.derive(event, ticket, now) else {
            return Ok(None);
        };
        notification::ActiveModel::from(&notice).insert(conn).await?;
        Ok(Some(notice))
    }

    async fn relay(&self, notice: Option<Notification>) {
        let (Some(relay), Some(notice)) = (self.relay.as_ref(), notice) else {
            return;
        };
        if let Err(err) = relay.relay(&notice).await {
            warn!(notification_id = %notice.id, error = ?err, "notification relay failed");
        }
    }
}

fn breach_unreported(row: &ticket::Model, now: DateTime<Utc>) -> bool {
    if row.breach_notified || row.status.is_terminal() {
        return false;
    }
    row.sla_breached
        || deadlines_of(row).is_some_and(|d| sla::is_breached(&d, row.first_response_at, now))
}

fn deadlines_of(row: &ticket::Model) -> Option<Deadlines> {
    Some(Deadlines {
        response: row.response_deadline?,
        resolution: row.resolution_deadline?,
    })
}

async fn find_ticket_row<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<ticket::Model, TicketError> {
    ticket::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| TicketError::ticket_not_found(id))
}

async fn load_ticket<C: ConnectionTrait>(conn: &C, id: Uuid, now: DateTime<Utc>) -> Result<Ticket, TicketError> {
    let row = find_ticket_row(conn, id).await?;
    let comments = comment::Entity::find()
        .filter(comment::Column::TicketId.eq(id))
        .order_by_asc(comment::Column::Seq)
        .all(conn)
        .await?;
    let attachments = attachment::Entity::find()
        .filter(attachment::Column::TicketId.eq(id))
        .order_by_asc(attachment::Column::Seq)
        .all(conn)
        .await?;
    let history = status_change::Entity::find()
        .filter(status_change::Column::TicketId.eq(id))
        .order_by_asc(status_change::Column::Seq)
        .all(conn)
        .await?;
    Ok(assemble(row, comments, attachments, history, now))
}

fn group_by_ticket<T>(rows: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

/// Builds the domain ticket from its rows. Children must already be in
/// `seq` order.
fn assemble(
    row: ticket::Model,
    comments: Vec<comment::Model>,
    attachments: Vec<attachment::Model>,
    history: Vec<status_change::Model>,
    now: DateTime<Utc>,
) -> Ticket {
    let mut own_attachments = Vec::new();
    let mut by_comment: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
    for attachment in attachments {
        match attachment.comment_id {
            Some(comment_id) => by_comment.entry(comment_id).or_default().push(attachment.into()),
            None => own_attachments.push(attachment.into()),
        }
    }

    let comments = comments
        .into_iter()
        .map(|c| {
            let attachments = by_comment.remove(&c.id).unwrap_or_default();
            c.into_domain(attachments)
        })
        .collect();

    let sla = deadlines_of(&row).map(|d| TicketSla {
        response_deadline: d.response,
        resolution_deadline: d.resolution,
        is_breached: if row.status.is_terminal() {
            row.sla_breached
        } else {
            row.sla_breached || sla::is_breached(&d, row.first_response_at, now)
        },
    });
    let tags = row.tag_list();

    Ticket {
        id: row.id,
        user_id: row.user_id,
        assigned_to: row.assigned_to,
        department: row.department,
        ticket_type: row.ticket_type,
        priority: row.priority,
        status: row.status,
        subject: row.subject,
        description: row.description,
        attachments: own_attachments,
        comments,
        status_history: history.into_iter().map(StatusChange::from).collect(),
        sla,
        tags,
        custom_fields: row.custom_fields,
        created_at: row.created_at,
        updated_at: row.updated_at,
        closed_at: row.closed_at,
        first_response_at: row.first_response_at,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn released_locks_leave_no_entry_behind() {
        let locks = TicketLocks::default();
        for _ in 0..100 {
            drop(locks.acquire(Uuid::new_v4()).await);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn waiting_writer_keeps_the_entry_alive() {
        let locks = TicketLocks::default();
        let id = Uuid::new_v4();

        let first = locks.acquire(id).await;
        let waiter = async {
            let second = locks.acquire(id).await;
            assert_eq!(locks.len(), 1);
            drop(second);
        };
        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(locks.len(), 1);
            drop(first);
        };
        tokio::join!(waiter, release);

        assert_eq!(locks.len(), 0);
    }
}
