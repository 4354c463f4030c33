//! Mixer GW - bridge a hardware digital mixer to web UI clients
//!
//! Keeps an authoritative in-memory model of mixer state (channels, buses,
//! meters, link status), a persisted self-healing layout configuration, and
//! a WebSocket fan-out that keeps every connected UI client current.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod layout;
pub mod link;
pub mod paths;
pub mod state;
