//! Hardware link boundary
//!
//! The protocol client that actually speaks to the mixer lives outside this
//! crate. It plugs in through two seams: the [`MixerLink`] trait for outbound
//! commands, and a [`TelemetryEvent`] channel for inbound telemetry. The pump
//! applies each event to the store and broadcasts it before picking up the
//! next one, so clients observe mutations in commit order.

use crate::broadcast::{ClientRegistry, ServerMessage};
use crate::state::{BusType, ChannelPatch, ConnectionStatus, MixerStore};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Raw telemetry emitted by the hardware protocol client
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Link status transition (retry/backoff is the link's own business)
    Status(ConnectionStatus),
    /// A channel parameter changed on the mixer
    Channel {
        bus_type: BusType,
        bus: u16,
        id: u16,
        patch: ChannelPatch,
    },
    /// Meter tick for one channel
    Meter {
        id: u16,
        pre: Option<f64>,
        post_fader: Option<f64>,
    },
    /// An aux bus was renamed on the mixer
    AuxName { id: u16, name: String },
}

/// Outbound command surface of the hardware protocol client
#[async_trait]
pub trait MixerLink: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    /// Push a parameter change down to the mixer
    async fn set_param(&self, bus_type: BusType, bus: u16, id: u16, patch: ChannelPatch)
        -> Result<()>;
}

/// Apply one telemetry event to the store and broadcast the resulting delta
///
/// Events against keys outside the configured universe are dropped; the
/// universe is fixed at boot and the hardware cannot grow it.
pub fn apply_event(store: &MixerStore, clients: &ClientRegistry, event: TelemetryEvent) {
    match event {
        TelemetryEvent::Status(status) => {
            store.set_connection_status(status);
            clients.broadcast(&ServerMessage::Status { connection_status: status });
        }
        TelemetryEvent::Channel { bus_type, bus, id, patch } => {
            match store.update_channel(bus_type, bus, id, &patch) {
                Some(ch) => {
                    clients.broadcast(&ServerMessage::Channel(ch));
                }
                None => debug!("Telemetry for unknown channel {bus_type}:{bus}:{id}"),
            }
        }
        TelemetryEvent::Meter { id, pre, post_fader } => {
            if store.set_meter(id, pre, post_fader) {
                clients.broadcast(&ServerMessage::Meter {
                    id,
                    meter_pre: pre,
                    meter_post_fader: post_fader,
                });
            }
        }
        TelemetryEvent::AuxName { id, name } => match store.update_aux_bus(id, &name) {
            Some(aux) => {
                clients.broadcast(&ServerMessage::Aux(aux));
            }
            None => debug!("Rename for unknown aux bus {id}"),
        },
    }
}

/// Drain the telemetry channel until the sender side is dropped
pub async fn run_telemetry(
    mut rx: mpsc::Receiver<TelemetryEvent>,
    store: MixerStore,
    clients: ClientRegistry,
) {
    while let Some(event) = rx.recv().await {
        apply_event(&store, &clients, event);
    }
    info!("Telemetry channel closed, pump stopping");
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use parking_lot::Mutex;

    /// Records outbound commands instead of talking to hardware
    #[derive(Default)]
    pub struct FakeLink {
        params: Mutex<Vec<(BusType, u16, u16, ChannelPatch)>>,
    }

    impl FakeLink {
        pub fn params(&self) -> Vec<(BusType, u16, u16, ChannelPatch)> {
            self.params.lock().clone()
        }
    }

    #[async_trait]
    impl MixerLink for FakeLink {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn set_param(
            &self,
            bus_type: BusType,
            bus: u16,
            id: u16,
            patch: ChannelPatch,
        ) -> Result<()> {
            self.params.lock().push((bus_type, bus, id, patch));
            Ok(())
        }
    }
}
