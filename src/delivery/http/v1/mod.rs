pub mod middleware;
pub mod notices;
