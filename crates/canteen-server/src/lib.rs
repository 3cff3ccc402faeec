//! # canteen-server
//!
//! Axum HTTP + `WebSocket` server for real-time canteen notifications.
//!
//! - Two socket namespaces on one listener: `/kitchen` and `/users`
//! - A single reactor task owning the connection registry and room membership,
//!   fed by a bounded event bus
//! - Targeted order notifications with push fallback for offline customers
//! - Health, Prometheus metrics and a small REST API
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod push;
pub mod rest;
pub mod server;
pub mod shutdown;
pub mod websocket;
