//! Mixer state type definitions
//!
//! Defines the core types for channel strips, buses, meters, and the
//! composite snapshot sent to observers.

use serde::{Deserialize, Serialize};

/// Bus type a channel strip belongs to
///
/// The same physical channel appears independently on the master bus, the
/// gain/trim stage, and each aux send, with its own fader/mute state per
/// context. Master and gain always use bus index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    Master,
    Gain,
    Aux,
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusType::Master => write!(f, "master"),
            BusType::Gain => write!(f, "gain"),
            BusType::Aux => write!(f, "aux"),
        }
    }
}

impl std::str::FromStr for BusType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(BusType::Master),
            "gain" => Ok(BusType::Gain),
            "aux" => Ok(BusType::Aux),
            _ => Err(()),
        }
    }
}

/// Connection status of the hardware link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    Disconnected,
}

/// Structured lookup key for a channel entry
///
/// The (bus_type, bus, id) triple uniquely identifies a channel entry; the
/// ordering derive keeps entries of one bus contiguous so per-bus snapshots
/// are range scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    pub bus_type: BusType,
    pub bus: u16,
    pub id: u16,
}

/// State of one channel strip on one bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    /// Stable hardware channel number
    pub id: u16,
    pub bus_type: BusType,
    /// Bus index (0 for master/gain)
    pub bus: u16,
    /// Normalized fader position (0..=1)
    pub fader: f64,
    /// Precise dB value when the hardware reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fader_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_pre: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_post_fader: Option<f64>,
    pub mute: bool,
    pub solo: bool,
    /// Timestamp of the last update (milliseconds since epoch)
    pub ts: u64,
}

/// Partial channel update merged over an existing record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPatch {
    pub fader: Option<f64>,
    pub fader_db: Option<f64>,
    pub mute: Option<bool>,
    pub solo: Option<bool>,
}

/// Meter levels for one channel, stored separately from channel records
///
/// Meters update at high frequency; keeping them out of the channel map means
/// a meter tick never rewrites a full channel record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterLevels {
    pub pre: Option<f64>,
    pub post_fader: Option<f64>,
}

/// State of one configured aux bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxBusState {
    pub id: u16,
    pub name: String,
    pub ts: u64,
}

/// The bus view a snapshot was taken for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusView {
    pub bus_type: BusType,
    pub bus: u16,
}

/// Composite point-in-time snapshot sent to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub host: String,
    pub connection_status: ConnectionStatus,
    pub view: BusView,
    /// All aux buses, sorted by id
    pub aux_buses: Vec<AuxBusState>,
    /// Channels of the requested view, sorted by channel id
    pub channels: Vec<ChannelState>,
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_type_roundtrip() {
        for (s, bt) in [
            ("master", BusType::Master),
            ("gain", BusType::Gain),
            ("aux", BusType::Aux),
        ] {
            assert_eq!(s.parse::<BusType>(), Ok(bt));
            assert_eq!(bt.to_string(), s);
        }
        assert!("main".parse::<BusType>().is_err());
    }

    #[test]
    fn test_channel_key_ordering_groups_buses() {
        let a = ChannelKey { bus_type: BusType::Aux, bus: 1, id: 9 };
        let b = ChannelKey { bus_type: BusType::Aux, bus: 2, id: 1 };
        let c = ChannelKey { bus_type: BusType::Master, bus: 0, id: 24 };
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_channel_state_serializes_camel_case() {
        let ch = ChannelState {
            id: 3,
            bus_type: BusType::Aux,
            bus: 2,
            fader: 0.5,
            fader_db: None,
            meter_pre: Some(0.1),
            meter_post_fader: None,
            mute: false,
            solo: true,
            ts: 42,
        };
        let v = serde_json::to_value(&ch).unwrap();
        assert_eq!(v["busType"], "aux");
        assert_eq!(v["meterPre"], 0.1);
        assert!(v.get("faderDb").is_none());
    }
}
