// src/lib.rs

pub mod alert;
pub mod api;
pub mod config;
pub mod cron;
pub mod error;
pub mod health;
pub mod repair;
pub mod server;
pub mod state;
pub mod store;
pub mod trend;
