pub mod contracts;
pub mod error;
pub mod jwt;
pub mod notices;
pub mod notifications;
pub mod stats;
