//! Event bus for geofence, progress and catalog events

use fleet_core::{Event, GeofenceEvent, VehicleId};

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Fan-out of tracker events with a bounded replay history
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    history: Arc<RwLock<VecDeque<Event>>>,
    max_history: usize,
    event_count: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize, max_history: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            history: Arc::new(RwLock::new(VecDeque::with_capacity(max_history))),
            max_history,
            event_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to subscribers and the history buffer.
    ///
    /// The history lock is held across the send so subscribers and
    /// `recent` observe the same order.
    pub fn publish(&self, event: Event) {
        let mut history = self.history.write();
        if self.max_history > 0 {
            if history.len() == self.max_history {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let total = self.event_count.fetch_add(1, Ordering::Relaxed) + 1;

        // No subscribers is not an error
        let _ = self.sender.send(event);
        drop(history);

        debug!("Event published, total: {}", total);
    }

    /// Most recent events, oldest first
    pub fn recent(&self, count: usize) -> Vec<Event> {
        let history = self.history.read();
        let start = history.len().saturating_sub(count);
        history.iter().skip(start).cloned().collect()
    }

    /// Most recent geofence transitions for one vehicle, oldest first
    pub fn recent_geofence_events(&self, vehicle_id: &VehicleId, count: usize) -> Vec<GeofenceEvent> {
        let history = self.history.read();
        let mut events: Vec<GeofenceEvent> = history
            .iter()
            .rev()
            .filter_map(|event| match &event.payload {
                fleet_core::EventPayload::Geofence(g) if &g.vehicle_id == vehicle_id => {
                    Some(g.event.clone())
                }
                _ => None,
            })
            .take(count)
            .collect();
        events.reverse();
        events
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024, 1000)
    }
}
