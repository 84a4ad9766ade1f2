//! Core types and trait definitions for the Liftlog workout store.
//!
//! This crate is deliberately free of database dependencies. The SQLite
//! backend implements the repository traits in [`repository`]; the
//! [`usecase`] layer and every caller depend only on those traits.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod exercise;
pub mod history;
pub mod remote;
pub mod repository;
pub mod sync;
pub mod time;
pub mod training_plan;
pub mod usecase;
pub mod user;
pub mod workout;

pub use error::{Error, Result};
