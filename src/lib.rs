//! notacloud file exchange server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod exchange;
pub mod routes;
pub mod state;
