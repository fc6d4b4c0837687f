pub mod attachment;
pub mod base_time;
pub mod comment;
pub mod notification;
pub mod status_change;
pub mod ticket;
pub mod user;
