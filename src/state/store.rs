//! MixerStore - authoritative in-memory mirror of hardware mixer state
//!
//! One entry per channel for the master and gain stages, one per
//! (channel, aux bus) pair. The universe of channel and aux ids is fixed at
//! construction; updates against unknown keys return `None` and never create
//! entries implicitly.

use super::types::{
    now_ms, AppState, AuxBusState, BusType, BusView, ChannelKey, ChannelPatch, ChannelState,
    ConnectionStatus, MeterLevels,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

struct StoreInner {
    host: String,
    status: ConnectionStatus,
    channels: BTreeMap<ChannelKey, ChannelState>,
    /// Meters are keyed by channel id only; display is bus-scoped, storage is not
    meters: HashMap<u16, MeterLevels>,
    aux_buses: BTreeMap<u16, AuxBusState>,
    channel_ids: BTreeSet<u16>,
}

/// Stores mixer state and serves point-in-time composite snapshots
#[derive(Clone)]
pub struct MixerStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MixerStore {
    /// Create a store pre-populated for the given channel and aux universes
    pub fn new(host: &str, channel_ids: &[u16], aux_ids: &[u16]) -> Self {
        let ts = now_ms();
        let mut channels = BTreeMap::new();

        let mut insert = |bus_type: BusType, bus: u16, id: u16| {
            let key = ChannelKey { bus_type, bus, id };
            channels.insert(
                key,
                ChannelState {
                    id,
                    bus_type,
                    bus,
                    fader: 0.0,
                    fader_db: None,
                    meter_pre: None,
                    meter_post_fader: None,
                    mute: false,
                    solo: false,
                    ts,
                },
            );
        };

        for &id in channel_ids {
            insert(BusType::Master, 0, id);
            insert(BusType::Gain, 0, id);
            for &bus in aux_ids {
                insert(BusType::Aux, bus, id);
            }
        }

        let aux_buses = aux_ids
            .iter()
            .map(|&id| {
                (
                    id,
                    AuxBusState {
                        id,
                        name: format!("Aux {id}"),
                        ts,
                    },
                )
            })
            .collect();

        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                host: host.to_string(),
                status: ConnectionStatus::Disconnected,
                channels,
                meters: HashMap::new(),
                aux_buses,
                channel_ids: channel_ids.iter().copied().collect(),
            })),
        }
    }

    /// Composite snapshot for one bus view, meters merged in at read time
    pub fn get_state(&self, bus_type: BusType, bus: u16) -> AppState {
        let inner = self.inner.read();

        let lo = ChannelKey { bus_type, bus, id: 0 };
        let hi = ChannelKey { bus_type, bus, id: u16::MAX };
        let channels = inner
            .channels
            .range(lo..=hi)
            .map(|(_, ch)| {
                let mut ch = ch.clone();
                if let Some(m) = inner.meters.get(&ch.id) {
                    ch.meter_pre = m.pre;
                    ch.meter_post_fader = m.post_fader;
                }
                ch
            })
            .collect();

        AppState {
            host: inner.host.clone(),
            connection_status: inner.status,
            view: BusView { bus_type, bus },
            aux_buses: inner.aux_buses.values().cloned().collect(),
            channels,
        }
    }

    /// Merge a partial update over an existing channel record
    ///
    /// Returns the updated record so the caller can broadcast exactly what
    /// changed, or `None` when the (bus_type, bus, id) key is outside the
    /// configured universe.
    pub fn update_channel(
        &self,
        bus_type: BusType,
        bus: u16,
        id: u16,
        patch: &ChannelPatch,
    ) -> Option<ChannelState> {
        let mut inner = self.inner.write();
        let key = ChannelKey { bus_type, bus, id };
        let ch = inner.channels.get_mut(&key)?;

        if let Some(fader) = patch.fader {
            ch.fader = fader;
        }
        if let Some(db) = patch.fader_db {
            ch.fader_db = Some(db);
        }
        if let Some(mute) = patch.mute {
            ch.mute = mute;
        }
        if let Some(solo) = patch.solo {
            ch.solo = solo;
        }
        // The clock can tick twice within one millisecond; keep ts strictly increasing
        ch.ts = now_ms().max(ch.ts + 1);

        Some(ch.clone())
    }

    /// Rename an aux bus; `None` for ids outside the configured universe
    pub fn update_aux_bus(&self, id: u16, name: &str) -> Option<AuxBusState> {
        let mut inner = self.inner.write();
        let aux = inner.aux_buses.get_mut(&id)?;
        aux.name = name.to_string();
        aux.ts = now_ms().max(aux.ts + 1);
        Some(aux.clone())
    }

    /// Merge meter levels for a channel, last-write-wins per field
    ///
    /// Returns false when the channel id is outside the universe.
    pub fn set_meter(&self, id: u16, pre: Option<f64>, post_fader: Option<f64>) -> bool {
        let mut inner = self.inner.write();
        if !inner.channel_ids.contains(&id) {
            return false;
        }
        let m = inner.meters.entry(id).or_default();
        if pre.is_some() {
            m.pre = pre;
        }
        if post_fader.is_some() {
            m.post_fader = post_fader;
        }
        true
    }

    pub fn set_connection_status(&self, status: ConnectionStatus) {
        self.inner.write().status = status;
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.read().status
    }

    pub fn set_host(&self, host: &str) {
        self.inner.write().host = host.to_string();
    }

    pub fn host(&self) -> String {
        self.inner.read().host.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> MixerStore {
        MixerStore::new("10.0.0.5", &[1, 2, 3], &[1, 2])
    }

    #[test]
    fn test_construction_populates_universe() {
        let store = make_store();

        let master = store.get_state(BusType::Master, 0);
        assert_eq!(master.channels.len(), 3);
        assert_eq!(master.aux_buses.len(), 2);
        assert_eq!(master.host, "10.0.0.5");
        assert_eq!(master.connection_status, ConnectionStatus::Disconnected);

        let aux2 = store.get_state(BusType::Aux, 2);
        assert_eq!(aux2.channels.len(), 3);
        assert!(aux2.channels.iter().all(|c| c.fader == 0.0 && !c.mute));
    }

    #[test]
    fn test_channels_sorted_by_id() {
        let store = MixerStore::new("h", &[9, 1, 5], &[1]);
        let state = store.get_state(BusType::Aux, 1);
        let ids: Vec<u16> = state.channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 5, 9]);
    }

    #[test]
    fn test_update_channel_merges_and_bumps_ts() {
        let store = make_store();
        let before = store.get_state(BusType::Aux, 1).channels[1].clone();

        let patch = ChannelPatch { fader: Some(0.75), ..Default::default() };
        let updated = store.update_channel(BusType::Aux, 1, 2, &patch).unwrap();
        assert_eq!(updated.fader, 0.75);
        assert!(updated.ts > before.ts, "ts must be strictly greater");
        // Untouched fields survive the merge
        assert!(!updated.mute);
        assert_eq!(updated.fader_db, None);
    }

    #[test]
    fn test_update_channel_unknown_key_is_none() {
        let store = make_store();
        let patch = ChannelPatch { fader: Some(0.5), ..Default::default() };

        assert!(store.update_channel(BusType::Aux, 99, 2, &patch).is_none());
        assert!(store.update_channel(BusType::Aux, 1, 42, &patch).is_none());
        assert!(store.update_channel(BusType::Master, 1, 1, &patch).is_none());

        // Store unchanged
        let state = store.get_state(BusType::Aux, 1);
        assert!(state.channels.iter().all(|c| c.fader == 0.0));
    }

    #[test]
    fn test_per_bus_state_is_independent() {
        let store = make_store();
        let patch = ChannelPatch { mute: Some(true), ..Default::default() };
        store.update_channel(BusType::Aux, 1, 2, &patch).unwrap();

        let aux1 = store.get_state(BusType::Aux, 1);
        let aux2 = store.get_state(BusType::Aux, 2);
        let master = store.get_state(BusType::Master, 0);
        assert!(aux1.channels[1].mute);
        assert!(!aux2.channels[1].mute);
        assert!(!master.channels[1].mute);
    }

    #[test]
    fn test_meters_merge_at_read_time() {
        let store = make_store();
        assert!(store.set_meter(2, Some(0.4), None));
        assert!(store.set_meter(2, None, Some(0.6)));

        let state = store.get_state(BusType::Master, 0);
        let ch = state.channels.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(ch.meter_pre, Some(0.4));
        assert_eq!(ch.meter_post_fader, Some(0.6));

        // Same meters visible on every bus view of that channel
        let aux = store.get_state(BusType::Aux, 1);
        let ch = aux.channels.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(ch.meter_post_fader, Some(0.6));
    }

    #[test]
    fn test_meter_unknown_channel_ignored() {
        let store = make_store();
        assert!(!store.set_meter(42, Some(0.9), None));
    }

    #[test]
    fn test_update_aux_bus() {
        let store = make_store();
        let aux = store.update_aux_bus(2, "Drums").unwrap();
        assert_eq!(aux.name, "Drums");
        assert!(store.update_aux_bus(9, "Nope").is_none());

        let state = store.get_state(BusType::Master, 0);
        assert_eq!(state.aux_buses[1].name, "Drums");
    }

    #[test]
    fn test_connection_status_and_host() {
        let store = make_store();
        store.set_connection_status(ConnectionStatus::Connected);
        store.set_host("10.0.0.9");
        let state = store.get_state(BusType::Gain, 0);
        assert_eq!(state.connection_status, ConnectionStatus::Connected);
        assert_eq!(state.host, "10.0.0.9");
    }
}
