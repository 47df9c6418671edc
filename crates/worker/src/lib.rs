pub mod dispatcher;
pub mod executor;
pub mod telegram;
