//! # canteen-platform
//!
//! Integrations with services outside the socket layer.
//!
//! - **Push**: subscription storage, HTTP push gateway delivery and the
//!   fallback notifier used when a target has no live connection

#![deny(unsafe_code)]

pub mod push;
