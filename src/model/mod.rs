pub mod auth;
pub mod global_error;
pub mod notification;
pub mod ticket;

pub use auth::{AuthResponse, AuthUser, Claims, LoginRequest, RegisterRequest, UserResponse, UserRole};
pub use global_error::{AppError, ErrorCode, ValidationFieldError};
pub use notification::{Notification, NotificationKind};
pub use ticket::{
    Attachment, AttachmentUpload, Comment, NewComment, NewTicket, StatusChange, Ticket, TicketPatch,
    TicketPriority, TicketSla, TicketStatus, TicketType,
};
