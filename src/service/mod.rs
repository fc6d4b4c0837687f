pub mod comment;
pub mod error;
pub mod notification;
pub mod query;
pub mod relay;
pub mod sla;
pub mod storage;
pub mod ticket_store;
pub mod validate;

pub use error::TicketError;
pub use notification::{NotificationRules, TicketEvent};
pub use query::{SortOrder, TicketQuery, TicketStats};
pub use relay::NotificationRelay;
pub use sla::{BusinessHours, Deadlines, SlaPolicies, SlaPolicy};
pub use storage::{FileStorage, LocalFileStorage};
pub use ticket_store::TicketStore;
