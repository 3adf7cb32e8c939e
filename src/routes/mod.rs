//! Router Module Index
//!
//! The HTTP surface is intentionally small: this service only *decides*.
//! Administrative mutation of roles, routes, translations and permissions happens
//! in an external admin tool; navigation and rendering happen in the frontend.
//! Everything exposed here is a read-only decision endpoint for those consumers.

/// The decision endpoints consumed by the navigation guard and menu renderer.
pub mod access;
