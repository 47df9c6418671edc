//! Durable task queue for outbound notifications.
//!
//! The queue is a plain Postgres table (`tasks`) mutated through
//! [`store::TaskStore`]. Claiming is optimistic: select the oldest due
//! pending row, then flip it to `processing` with a conditional update.
//! Losing that race is cheap — the caller just re-polls.
//!
//! The other modules are the pure pieces around the store: retry
//! scheduling ([`backoff`]), the post-send pause ([`limiter`]), the
//! runtime-tunable settings row ([`settings`]), and the append-only
//! outcome log ([`outcome`]).

pub mod backoff;
pub mod limiter;
pub mod outcome;
pub mod settings;
pub mod store;
