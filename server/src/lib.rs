//! Taskboard server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod presence;
pub mod routes;
pub mod state;
pub mod tasks;
pub mod users;
pub mod ws;
