//! # Store Monitor Backend
//!
//! Uptime/downtime analytics engine for a fleet of retail stores.
//!
//! This crate answers a single reporting question: for each store, how much of
//! its scheduled business time during the last hour, day, and week was the
//! store observed active versus inactive? Inputs are sparse roughly-hourly
//! status polls in UTC, per-store weekly business-hour schedules in local
//! time, and per-store IANA timezone identifiers. The result is a CSV report,
//! one row per store, generated by an asynchronous background job and exposed
//! over a REST API via Axum.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Identifier newtypes and report row DTOs
//! - [`models`]: Domain records (polls, schedules, reports) and time parsing
//! - [`db`]: Database operations, repository pattern, and persistence layer
//! - [`services`]: The estimator pipeline and report generation driver
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Estimator pipeline
//!
//! Report generation fans out per store across a bounded worker pool. Each
//! store's estimate is computed by materializing business-hour windows in UTC
//! from the local-time schedule ([`services::business_windows`]), turning the
//! poll sequence into a contiguous status signal ([`services::status_signal`]),
//! and intersecting the two ([`services::overlap`]). The three reporting
//! windows (hour/day/week) are derived by clipping the business windows, never
//! by dividing weekly totals.

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
