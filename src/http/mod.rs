//! HTTP server module for the store monitor backend.
//!
//! This module provides an axum-based HTTP server that exposes report
//! generation as a REST API. It reuses the service layer, repository pattern,
//! and DTOs from the core library.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Request parsing and validation                         │
//! │  - JSON / CSV serialization                               │
//! │  - CORS, compression, error handling                      │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! │  - Report driver and estimator pipeline                   │
//! └───────────────────┬──────────────────────────────────────┘
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! │  - LocalRepository / SqliteRepository                     │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;

pub mod router;

pub mod state;

pub mod error;

pub mod dto;

pub use router::create_router;

pub use state::AppState;
