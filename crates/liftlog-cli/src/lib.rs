//! Command-line front end for the liftlog store.

pub mod commands;
pub mod config;
pub mod container;

pub use self::{
  commands::{Command, run},
  config::AppConfig,
  container::Container,
};
