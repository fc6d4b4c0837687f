//! Field rules for ticket submissions and edits.

use std::str::FromStr;

use serde_json::Value;

use crate::model::global_error::ValidationFieldError;
use crate::model::ticket::{AttachmentUpload, NewTicket, TicketPatch, TicketPriority, TicketType};
use crate::service::error::TicketError;
use crate::service::storage::{MAX_ATTACHMENT_BYTES, MAX_SUBMISSION_ATTACHMENTS};

pub const SUBJECT_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MIN_CHARS: usize = 50;

/// A submission that passed every field rule.
#[derive(Debug, Clone)]
pub struct ValidTicket {
    pub owner_id: String,
    pub ticket_type: TicketType,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: String,
    pub department: Option<String>,
    pub tags: Vec<String>,
    pub custom_fields: Option<Value>,
}

/// Collects every violation rather than stopping at the first one.
pub fn new_ticket(ticket: &NewTicket) -> Result<ValidTicket, TicketError> {
    let mut errors = Vec::new();

    let owner_id = required(&mut errors, "userId", ticket.owner_id.as_deref());
    let ticket_type = required(&mut errors, "type", ticket.ticket_type.as_deref())
        .and_then(|raw| parse_enum::<TicketType>(&mut errors, "type", raw));
    let priority = required(&mut errors, "priority", ticket.priority.as_deref())
        .and_then(|raw| parse_enum::<TicketPriority>(&mut errors, "priority", raw));
    let subject = required(&mut errors, "subject", ticket.subject.as_deref());
    if let Some(subject) = subject {
        check_subject(&mut errors, subject);
    }
    let description = required(&mut errors, "description", ticket.description.as_deref());
    if let Some(description) = description {
        check_description(&mut errors, description);
    }

    if ticket.attachments.len() > MAX_SUBMISSION_ATTACHMENTS {
        errors.push(ValidationFieldError::new(
            "attachments",
            format!("at most {MAX_SUBMISSION_ATTACHMENTS} files may be attached"),
        ));
    }
    for upload in &ticket.attachments {
        check_attachment(&mut errors, upload);
    }
    check_custom_fields(&mut errors, ticket.custom_fields.as_ref());

    match (owner_id, ticket_type, priority, subject, description) {
        (Some(owner_id), Some(ticket_type), Some(priority), Some(subject), Some(description))
            if errors.is_empty() =>
        {
            Ok(ValidTicket {
                owner_id: owner_id.to_string(),
                ticket_type,
                priority,
                subject: subject.to_string(),
                description: description.to_string(),
                department: ticket.department.clone().filter(|d| !d.trim().is_empty()),
                tags: normalize_tags(&ticket.tags),
                custom_fields: ticket.custom_fields.clone(),
            })
        }
        _ => Err(TicketError::Validation(errors)),
    }
}

/// Parsed form of a patch. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ValidPatch {
    pub department: Option<String>,
    pub ticket_type: Option<TicketType>,
    pub priority: Option<TicketPriority>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<Value>,
}

pub fn patch(patch: &TicketPatch) -> Result<ValidPatch, TicketError> {
    let mut errors = Vec::new();

    let ticket_type = patch
        .ticket_type
        .as_deref()
        .and_then(|raw| parse_enum::<TicketType>(&mut errors, "type", raw));
    let priority = patch
        .priority
        .as_deref()
        .and_then(|raw| parse_enum::<TicketPriority>(&mut errors, "priority", raw));
    if let Some(subject) = patch.subject.as_deref() {
        if subject.trim().is_empty() {
            errors.push(ValidationFieldError::new("subject", "subject is required"));
        } else {
            check_subject(&mut errors, subject);
        }
    }
    if let Some(description) = patch.description.as_deref() {
        if description.trim().is_empty() {
            errors.push(ValidationFieldError::new("description", "description is required"));
        } else {
            check_description(&mut errors, description);
        }
    }
    check_custom_fields(&mut errors, patch.custom_fields.as_ref());

    if !errors.is_empty() {
        return Err(TicketError::Validation(errors));
    }

    Ok(ValidPatch {
        department: patch.department.clone(),
        ticket_type,
        priority,
        subject: patch.subject.clone(),
        description: patch.description.clone(),
        tags: patch.tags.as_deref().map(normalize_tags),
        custom_fields: patch.custom_fields.clone(),
    })
}

pub fn attachment(upload: &AttachmentUpload) -> Result<(), TicketError> {
    let mut errors = Vec::new();
    check_attachment(&mut errors, upload);
    if errors.is_empty() { Ok(()) } else { Err(TicketError::Validation(errors)) }
}

pub fn comment_content(content: &str) -> Result<(), TicketError> {
    if content.trim().is_empty() {
        return Err(TicketError::invalid("content", "comment must not be empty"));
    }
    Ok(())
}

/// Trims, drops blanks and removes duplicates while keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !out.iter().any(|seen| seen == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn required<'a>(
    errors: &mut Vec<ValidationFieldError>,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.push(ValidationFieldError::new(field, format!("{field} is required")));
            None
        }
    }
}

fn parse_enum<T>(errors: &mut Vec<ValidationFieldError>, field: &str, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: ToString,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(ValidationFieldError::new(field, err.to_string()));
            None
        }
    }
}

fn check_subject(errors: &mut Vec<ValidationFieldError>, subject: &str) {
    if subject.chars().count() > SUBJECT_MAX_CHARS {
        errors.push(ValidationFieldError::new(
            "subject",
            format!("subject must be at most {SUBJECT_MAX_CHARS} characters"),
        ));
    }
}

fn check_description(errors: &mut Vec<ValidationFieldError>, description: &str) {
    if description.chars().count() < DESCRIPTION_MIN_CHARS {
        errors.push(ValidationFieldError::new(
            "description",
            format!("description must be at least {DESCRIPTION_MIN_CHARS} characters"),
        ));
    }
}

fn check_custom_fields(errors: &mut Vec<ValidationFieldError>, fields: Option<&Value>) {
    if fields.is_some_and(|v| !v.is_object()) {
        errors.push(ValidationFieldError::new("customFields", "custom fields must be a JSON object"));
    }
}

fn check_attachment(errors: &mut Vec<ValidationFieldError>, upload: &AttachmentUpload) {
    if upload.name.trim().is_empty() || upload.url.trim().is_empty() {
        errors.push(ValidationFieldError::new("attachments", "attachment needs a name and a url"));
    }
    if upload.size < 0 || upload.size as u64 > MAX_ATTACHMENT_BYTES {
        errors.push(ValidationFieldError::new(
            "attachments",
            format!("`{}` exceeds the 10 MiB limit", upload.name),
        ));
    }
}
