pub mod notice;
pub mod notification;
pub mod stats;
pub mod user;
