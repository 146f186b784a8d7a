// src/api/mod.rs

pub mod error;
