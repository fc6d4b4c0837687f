use sea_orm::DbErr;
use thiserror::Error;

use crate::model::global_error::ValidationFieldError;
use crate::service::storage::FileStorageError;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("invalid fields: {}", field_names(.0))]
    Validation(Vec<ValidationFieldError>),

    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },

    #[error("not permitted: {0}")]
    Forbidden(&'static str),

    #[error("storage unavailable: {0}")]
    Storage(#[from] DbErr),

    #[error(transparent)]
    FileStorage(#[from] FileStorageError),
}

impl TicketError {
    pub fn ticket_not_found(id: impl ToString) -> Self {
        TicketError::NotFound { entity: "ticket", id: id.to_string() }
    }

    pub fn notification_not_found(id: impl ToString) -> Self {
        TicketError::NotFound { entity: "notification", id: id.to_string() }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        TicketError::Validation(vec![ValidationFieldError::new(field, message)])
    }

    /// Field names a validation failure was raised for; empty otherwise.
    pub fn violated_fields(&self) -> Vec<&str> {
        match self {
            TicketError::Validation(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn field_names(errors: &[ValidationFieldError]) -> String {
    errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>().join(", ")
}
