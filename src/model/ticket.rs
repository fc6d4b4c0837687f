use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "in-progress")]
    InProgress,
    #[sea_orm(string_value = "on-hold")]
    OnHold,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl TicketStatus {
    /// Lifecycle order, also the column order of the board view.
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::OnHold,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::OnHold => "on-hold",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Terminal tickets have their SLA breach state frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "status", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum TicketPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }

    /// Urgency rank, 0 being the most urgent.
    pub fn rank(&self) -> u8 {
        match self {
            TicketPriority::Critical => 0,
            TicketPriority::High => 1,
            TicketPriority::Medium => 2,
            TicketPriority::Low => 3,
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "priority", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum TicketType {
    #[sea_orm(string_value = "bug")]
    Bug,
    #[sea_orm(string_value = "feature-request")]
    FeatureRequest,
    #[sea_orm(string_value = "technical-support")]
    TechnicalSupport,
    #[sea_orm(string_value = "other")]
    Other,
}

impl TicketType {
    pub const ALL: [TicketType; 4] = [
        TicketType::Bug,
        TicketType::FeatureRequest,
        TicketType::TechnicalSupport,
        TicketType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Bug => "bug",
            TicketType::FeatureRequest => "feature-request",
            TicketType::TechnicalSupport => "technical-support",
            TicketType::Other => "other",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketType::ALL
            .into_iter()
            .find(|ticket_type| ticket_type.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "type", value: s.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A file already accepted by the file storage, referenced from a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub from_status: TicketStatus,
    pub to_status: TicketStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketSla {
    pub response_deadline: DateTime<Utc>,
    pub resolution_deadline: DateTime<Utc>,
    pub is_breached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: String,
    pub assigned_to: Option<String>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub subject: String,
    pub description: String,
    pub attachments: Vec<Attachment>,
    pub comments: Vec<Comment>,
    pub status_history: Vec<StatusChange>,
    pub sla: Option<TicketSla>,
    pub tags: Vec<String>,
    pub custom_fields: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub first_response_at: Option<DateTime<Utc>>,
}

/// Fields of a ticket submission. Required fields stay optional here so that
/// validation can report every missing one by name.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub owner_id: Option<String>,
    pub ticket_type: Option<String>,
    pub priority: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub tags: Vec<String>,
    pub custom_fields: Option<Value>,
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub priority: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub custom_fields: Option<Value>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

impl CreateTicketRequest {
    pub fn into_new_ticket(self, owner_id: String) -> NewTicket {
        NewTicket {
            owner_id: Some(owner_id),
            ticket_type: self.ticket_type,
            priority: self.priority,
            subject: self.subject,
            description: self.description,
            department: self.department,
            tags: self.tags,
            custom_fields: self.custom_fields,
            attachments: self.attachments,
        }
    }
}

/// Partial update. Status is not patchable; it only changes through a
/// status transition.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketPatch {
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub priority: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransitionRequest {
    pub status: TicketStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignTicketRequest {
    pub agent_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketListResponse {
    pub tickets: Vec<Ticket>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
    }

    #[test]
    fn unknown_priority_names_the_kind() {
        let err = "urgent".parse::<TicketPriority>().unwrap_err();
        assert_eq!(err.to_string(), "unknown priority `urgent`");
    }

    #[test]
    fn critical_outranks_high() {
        assert!(TicketPriority::Critical.rank() < TicketPriority::High.rank());
        assert!(TicketPriority::Medium.rank() < TicketPriority::Low.rank());
    }

    #[test]
    fn only_resolved_and_closed_are_terminal() {
        let terminal: Vec<_> = TicketStatus::ALL.into_iter().filter(TicketStatus::is_terminal).collect();
        assert_eq!(terminal, vec![TicketStatus::Resolved, TicketStatus::Closed]);
    }
}
