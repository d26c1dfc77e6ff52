// src/lib.rs

//! slotwatch: court availability monitor

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
