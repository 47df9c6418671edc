//! Administrative HTTP surface for the dispatch engine.
//!
//! Operators use it to watch queue depths, inspect failed tasks, trigger
//! bulk resends, release stale claims, and tune the dispatch settings row.

pub mod middleware;
pub mod routes;
pub mod state;
