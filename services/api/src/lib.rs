//! services/api/src/lib.rs
//!
//! The MoneyQuest API service: database and LLM adapters plus the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
