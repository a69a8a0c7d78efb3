//! Asset Ingest Pipeline
//!
//! This library implements bulk AI media generation for game assets. Batch
//! submissions are expanded into per-generation job items, placed on an
//! in-process work queue, and driven to completion by a single background
//! worker that calls the external generation, storage, and asset services.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
