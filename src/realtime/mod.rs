//! In-process realtime layer: per-trip broadcast channels plus the ephemeral
//! presence/typing registries. Constructor-injected via `AppState`; nothing
//! here is a global, and nothing here is durable.
//!
//! Everything in this module is best-effort by design: a lost presence
//! update must never fail the mutation that triggered it, so publishing
//! swallows send errors and only logs them.

pub mod events;
mod presence;

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

pub use events::TripEvent;
pub use presence::TYPING_TTL_SECS;

use crate::models::{PresenceData, PresenceUpdate};
use presence::PresenceRegistry;

const CHANNEL_CAPACITY: usize = 100;

struct TripChannel {
    events: broadcast::Sender<TripEvent>,
    presence: PresenceRegistry,
}

impl TripChannel {
    fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            events,
            presence: PresenceRegistry::new(),
        }
    }
}

/// Fan-out hub for all live trips. Channels are created lazily on first
/// subscribe/publish and kept for the lifetime of the process.
pub struct RealtimeHub {
    channels: DashMap<String, Arc<TripChannel>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn channel(&self, trip_id: &str) -> Arc<TripChannel> {
        self.channels
            .entry(trip_id.to_string())
            .or_insert_with(|| Arc::new(TripChannel::new()))
            .clone()
    }

    /// Subscribe to a trip's event stream. Dropping the receiver is the
    /// unsubscribe.
    pub fn subscribe(&self, trip_id: &str) -> broadcast::Receiver<TripEvent> {
        self.channel(trip_id).events.subscribe()
    }

    /// Broadcast an event to every subscriber of the trip. Best-effort: with
    /// no subscribers (or lagged ones) the event is simply dropped.
    pub fn publish(&self, trip_id: &str, event: TripEvent) {
        let channel = self.channel(trip_id);
        if let Err(e) = channel.events.send(event) {
            debug!("No live subscribers for trip {trip_id}: {e}");
        }
    }

    /// Merge a partial presence update for (trip, user), stamping
    /// `last_seen`, then broadcast the new presence list.
    pub fn update_presence(
        &self,
        trip_id: &str,
        user_id: &str,
        name: &str,
        update: PresenceUpdate,
    ) {
        let channel = self.channel(trip_id);
        channel.presence.update(user_id, name, update);
        Self::broadcast_presence(&channel, trip_id);
    }

    /// Server-side disconnect hook: flips the user's record to offline when
    /// their connection task ends.
    pub fn mark_offline(&self, trip_id: &str, user_id: &str) {
        let channel = self.channel(trip_id);
        channel.presence.mark_offline(user_id);
        channel.presence.clear_typing(user_id);
        Self::broadcast_presence(&channel, trip_id);
        Self::broadcast_typing(&channel, trip_id);
    }

    pub fn presence_snapshot(&self, trip_id: &str) -> Vec<PresenceData> {
        self.channel(trip_id).presence.snapshot(Utc::now())
    }

    /// Mark a user as typing (with the self-expiring TTL) or clear the
    /// marker immediately, then broadcast the new typing list either way.
    pub fn set_typing(&self, trip_id: &str, user_id: &str, is_typing: bool) {
        let channel = self.channel(trip_id);
        if is_typing {
            let stamp = channel.presence.set_typing(user_id);

            // Scheduled clear so a client that crashes mid-keystroke does
            // not leave a stale indicator. A newer marker wins over this
            // timer; the lazy filter in snapshots covers the gap anyway.
            let chan = Arc::clone(&channel);
            let trip = trip_id.to_string();
            let user = user_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(TYPING_TTL_SECS as u64)).await;
                if chan.presence.clear_typing_if_stamped(&user, stamp) {
                    Self::broadcast_typing(&chan, &trip);
                }
            });
        } else {
            channel.presence.clear_typing(user_id);
        }
        Self::broadcast_typing(&channel, trip_id);
    }

    /// User ids currently typing in the trip, expired markers filtered out.
    pub fn typing_snapshot(&self, trip_id: &str) -> Vec<String> {
        self.channel(trip_id).presence.typing_snapshot(Utc::now())
    }

    fn broadcast_presence(channel: &TripChannel, trip_id: &str) {
        let members = channel.presence.snapshot(Utc::now());
        if let Err(e) = channel.events.send(TripEvent::PresenceChanged {
            trip_id: trip_id.to_string(),
            members,
        }) {
            debug!("Presence broadcast dropped for trip {trip_id}: {e}");
        }
    }

    fn broadcast_typing(channel: &TripChannel, trip_id: &str) {
        let user_ids = channel.presence.typing_snapshot(Utc::now());
        if let Err(e) = channel.events.send(TripEvent::TypingChanged {
            trip_id: trip_id.to_string(),
            user_ids,
        }) {
            debug!("Typing broadcast dropped for trip {trip_id}: {e}");
        }
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
