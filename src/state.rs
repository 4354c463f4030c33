//! State management module - authoritative mirror of hardware mixer state
//!
//! This module provides the store that tracks per-bus channel state, aux bus
//! names, meter levels, and the hardware link status, and serves the
//! composite snapshots pushed to connected UI clients.

mod store;
mod types;

pub use store::MixerStore;
pub use types::{
    now_ms, AppState, AuxBusState, BusType, BusView, ChannelKey, ChannelPatch, ChannelState,
    ConnectionStatus, MeterLevels,
};
