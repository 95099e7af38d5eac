//! Online/offline transitions from the host's [`NetworkMonitor`].

use bridge_traits::network::{NetworkMonitor, NetworkStatus};
use core_runtime::events::{ClientEvent, ConnectivityEvent, EventBus};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Publish a [`ConnectivityEvent`] for the current state, then one per
/// transition until the monitor's stream ends.
pub(crate) fn spawn_watcher(monitor: Arc<dyn NetworkMonitor>, events: EventBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = match monitor.get_network_info().await {
            Ok(info) => announce(&events, None, info.status),
            Err(e) => {
                warn!(error = %e, "Initial network probe failed");
                None
            }
        };

        let mut changes = match monitor.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Network change stream unavailable");
                return;
            }
        };

        while let Some(info) = changes.next().await {
            last = announce(&events, last, info.status).or(last);
        }
        debug!("Network change stream closed");
    })
}

/// Emit an event when `status` is a definite state different from `last`.
/// Returns the new state when one was emitted.
fn announce(
    events: &EventBus,
    last: Option<ConnectivityEvent>,
    status: NetworkStatus,
) -> Option<ConnectivityEvent> {
    let next = match status {
        NetworkStatus::Connected => ConnectivityEvent::Online,
        NetworkStatus::Disconnected => ConnectivityEvent::Offline,
        NetworkStatus::Indeterminate => return None,
    };
    if last == Some(next) {
        return None;
    }

    info!(state = ?next, "Connectivity changed");
    events.emit(ClientEvent::Connectivity(next)).ok();
    Some(next)
}
