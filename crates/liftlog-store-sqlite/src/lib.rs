//! SQLite backend for the liftlog workout store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation writes its entity rows
//! and the matching outbox entry in one immediate-mode transaction.

mod cascade;
mod encode;
mod rows;

pub mod database;
pub mod error;
pub mod exercise_sets;
pub mod exercises;
pub mod ledger;
pub mod migrations;
pub mod outbox;
pub mod store;
pub mod sync_state;
pub mod training_plans;
pub mod users;
pub mod workouts;

pub use database::{Database, DatabaseOptions, Location};
pub use error::{Error, Result};
pub use exercise_sets::SqliteExerciseSets;
pub use exercises::SqliteExercises;
pub use ledger::SqliteLedger;
pub use outbox::SqliteOutbox;
pub use store::SqliteStore;
pub use sync_state::SqliteSyncState;
pub use training_plans::SqliteTrainingPlans;
pub use users::SqliteUsers;
pub use workouts::SqliteWorkouts;

#[cfg(test)]
mod tests;
