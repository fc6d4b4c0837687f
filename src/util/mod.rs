pub mod slack;

pub use slack::SlackRelay;
