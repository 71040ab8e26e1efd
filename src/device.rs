//! Device session tracking
//!
//! One vendor, several product roles: a BLE mouse, a 2.4G dongle, and a BLE
//! keyboard all share vendor ID 0x248A and are told apart by product ID.
//! The tracker owns the registry of live sessions keyed by an opaque device
//! handle, drives connect/disconnect events, and handles the dongle's
//! identifier discovery dance: poke it once with a vendor init report, then
//! wait for the identifier to come back inside an input report.
//!
//! Unknown product IDs are ignored entirely: no session, no event.

use crate::cache::IdCache;
use crate::event::Event;
use crate::platform::DeviceHost;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque device handle, stable for the lifetime of one connection.
/// A reused handle after removal is a new session.
pub type DeviceHandle = u64;

/// Vendor ID shared by all supported devices
pub const VENDOR_ID: u16 = 0x248A;

/// Init report that makes the dongle reveal its identifier
/// (byte 0 is the report ID)
pub const DONGLE_INIT_REPORT: [u8; 4] = [5, 1, 0, 0];

/// Device role, classified by product ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    BleMouse,
    Dongle,
    BleKeyboard,
}

/// Static per-role configuration. New device variants are added here,
/// not as new branches.
#[derive(Debug, Clone, Copy)]
pub struct RoleSpec {
    pub product_id: u16,
    pub role: DeviceRole,
    /// Usage page of this role's audio/button reports; None means the role
    /// carries no audio
    pub audio_usage_page: Option<u32>,
    /// `deviceMode` value announced to clients
    pub device_mode: i32,
}

pub const ROLE_TABLE: &[RoleSpec] = &[
    RoleSpec {
        product_id: 0x8266,
        role: DeviceRole::BleMouse,
        audio_usage_page: Some(0xFF12),
        device_mode: 5,
    },
    RoleSpec {
        product_id: 0xCA10,
        role: DeviceRole::Dongle,
        audio_usage_page: Some(0xFF02),
        device_mode: 2,
    },
    RoleSpec {
        product_id: 0x8208,
        role: DeviceRole::BleKeyboard,
        audio_usage_page: None,
        device_mode: 0,
    },
];

/// `deviceType` is constant for this product family
const DEVICE_TYPE: i32 = 0;

/// One live device connection
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub handle: DeviceHandle,
    pub product_id: u16,
    pub role: DeviceRole,
    /// MAC-like identifier; filled at connect or discovered later
    pub identifier: Option<String>,
    pub audio_usage_page: Option<u32>,
    pub device_mode: i32,
}

impl DeviceSession {
    fn connect_event(&self) -> Option<Event> {
        let id = self.identifier.clone()?;
        Some(Event::DeviceConnect {
            mac: id.clone(),
            id,
            device_type: DEVICE_TYPE,
            device_mode: self.device_mode,
        })
    }
}

/// Registry of live device sessions with explicit lifecycle
pub struct SessionTracker {
    sessions: HashMap<DeviceHandle, DeviceSession>,
    cache: IdCache,
    host: Arc<dyn DeviceHost>,
}

impl SessionTracker {
    pub fn new(cache: IdCache, host: Arc<dyn DeviceHost>) -> Self {
        Self {
            sessions: HashMap::new(),
            cache,
            host,
        }
    }

    pub fn session(&self, handle: DeviceHandle) -> Option<&DeviceSession> {
        self.sessions.get(&handle)
    }

    /// Usage page of the session's audio reports, if the role has audio
    pub fn audio_usage_page(&self, handle: DeviceHandle) -> Option<u32> {
        self.sessions.get(&handle).and_then(|s| s.audio_usage_page)
    }

    /// A device with our vendor identity appeared.
    ///
    /// `identifier` is what the platform layer already knows (the BLE stack
    /// can name a Bluetooth mouse at attach time); the dongle never has one
    /// here and goes through cache-or-probe instead.
    pub fn on_connect(
        &mut self,
        handle: DeviceHandle,
        product_id: u16,
        identifier: Option<String>,
    ) -> Vec<Event> {
        let Some(spec) = ROLE_TABLE.iter().find(|s| s.product_id == product_id) else {
            tracing::trace!("Ignoring unknown product {:#06x}", product_id);
            return Vec::new();
        };

        let mut session = DeviceSession {
            handle,
            product_id,
            role: spec.role,
            identifier,
            audio_usage_page: spec.audio_usage_page,
            device_mode: spec.device_mode,
        };

        let mut events = Vec::new();
        match spec.role {
            DeviceRole::BleMouse => {
                tracing::info!("Bluetooth mouse connected (handle {})", handle);
                match session.connect_event() {
                    Some(event) => events.push(event),
                    None => tracing::warn!("No identifier known for Bluetooth mouse yet"),
                }
            }
            DeviceRole::Dongle => {
                tracing::info!("2.4G dongle connected (handle {})", handle);
                if let Some(cached) = self.cache.load() {
                    tracing::info!("Loaded cached identifier {}", cached);
                    session.identifier = Some(cached);
                    events.extend(session.connect_event());
                } else if let Err(e) = self.host.send_report(handle, &DONGLE_INIT_REPORT) {
                    // Fire and forget: no retry, the dongle either answers
                    // with a discovery report or stays anonymous.
                    tracing::warn!("Failed to send dongle init report: {}", e);
                }
            }
            DeviceRole::BleKeyboard => {
                // Tracked for lifecycle symmetry; carries no audio and is
                // never announced.
                tracing::info!("Bluetooth keyboard connected (handle {})", handle);
            }
        }

        self.sessions.insert(handle, session);
        events
    }

    /// The device answered with its identifier (dongle discovery report,
    /// or a late BLE lookup).
    pub fn on_identifier_discovered(
        &mut self,
        handle: DeviceHandle,
        identifier: String,
    ) -> Vec<Event> {
        let Some(session) = self.sessions.get_mut(&handle) else {
            tracing::warn!("Identifier {} for unknown handle {}", identifier, handle);
            return Vec::new();
        };

        tracing::info!("Discovered identifier {} for handle {}", identifier, handle);
        session.identifier = Some(identifier.clone());

        if session.role == DeviceRole::Dongle {
            if let Err(e) = self.cache.store(&identifier) {
                tracing::warn!("Failed to persist identifier: {}", e);
            }
        }

        session.connect_event().into_iter().collect()
    }

    /// The device went away. Emits a disconnect when the session was ever
    /// announceable and clears the dongle's cached identifier.
    pub fn on_remove(&mut self, handle: DeviceHandle) -> Vec<Event> {
        let Some(session) = self.sessions.remove(&handle) else {
            return Vec::new();
        };

        tracing::info!("Device {:?} removed (handle {})", session.role, handle);

        if session.role == DeviceRole::Dongle {
            self.cache.clear();
        }

        if session.role == DeviceRole::BleKeyboard {
            return Vec::new();
        }

        let Some(id) = session.identifier else {
            tracing::debug!("Removed session had no identifier, nothing to announce");
            return Vec::new();
        };

        vec![Event::DeviceDisconnect {
            id,
            device_type: DEVICE_TYPE,
            device_mode: session.device_mode,
        }]
    }

    /// Replay DeviceConnect for every announceable live session, so a
    /// late-joining client sees current device state.
    pub fn resync(&self) -> Vec<Event> {
        let mut events: Vec<Event> = Vec::new();
        let mut sessions: Vec<&DeviceSession> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.handle);
        for session in sessions {
            if session.role == DeviceRole::BleKeyboard {
                continue;
            }
            events.extend(session.connect_event());
        }
        events
    }
}

/// Recognize the dongle's identifier-discovery input report and extract the
/// identifier: `[0x81, 0x01, 0x10, m0..m5, ..]` becomes `m0:m1:...:m5` in
/// lowercase hex.
pub fn parse_identifier_report(data: &[u8]) -> Option<String> {
    if data.len() < 9 || data[0] != 0x81 || data[1] != 0x01 || data[2] != 0x10 {
        return None;
    }

    let id = data[3..9]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":");
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHost {
        reports: AtomicUsize,
    }

    impl CountingHost {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                reports: AtomicUsize::new(0),
            })
        }
    }

    impl DeviceHost for CountingHost {
        fn send_report(
            &self,
            _handle: DeviceHandle,
            report: &[u8],
        ) -> Result<(), crate::error::DeviceError> {
            assert_eq!(report, DONGLE_INIT_REPORT);
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn temp_tracker() -> (tempfile::TempDir, SessionTracker, Arc<CountingHost>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = IdCache::new(dir.path().join("device_id.txt"));
        let host = CountingHost::new();
        let tracker = SessionTracker::new(cache, host.clone());
        (dir, tracker, host)
    }

    #[test]
    fn test_unknown_product_creates_no_session() {
        let (_dir, mut tracker, _host) = temp_tracker();
        let events = tracker.on_connect(1, 0xBEEF, None);
        assert!(events.is_empty());
        assert!(tracker.session(1).is_none());
    }

    #[test]
    fn test_ble_mouse_with_identifier_announces_immediately() {
        let (_dir, mut tracker, host) = temp_tracker();
        let events = tracker.on_connect(1, 0x8266, Some("aa:bb:cc:dd:ee:ff".into()));
        assert_eq!(
            events,
            vec![Event::DeviceConnect {
                id: "aa:bb:cc:dd:ee:ff".into(),
                device_type: 0,
                device_mode: 5,
                mac: "aa:bb:cc:dd:ee:ff".into(),
            }]
        );
        assert_eq!(host.reports.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dongle_cache_miss_probes_device() {
        let (_dir, mut tracker, host) = temp_tracker();
        let events = tracker.on_connect(2, 0xCA10, None);
        assert!(events.is_empty(), "no announce before identifier is known");
        assert_eq!(host.reports.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dongle_cache_hit_skips_probe() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IdCache::new(dir.path().join("device_id.txt"));
        cache.store("11:22:33:44:55:66").unwrap();

        let host = CountingHost::new();
        let mut tracker = SessionTracker::new(cache, host.clone());

        let events = tracker.on_connect(2, 0xCA10, None);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::DeviceConnect { id, device_mode: 2, .. } if id == "11:22:33:44:55:66"
        ));
        assert_eq!(host.reports.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_discovery_persists_and_announces() {
        let (_dir, mut tracker, _host) = temp_tracker();
        tracker.on_connect(2, 0xCA10, None);

        let events = tracker.on_identifier_discovered(2, "aa:bb:cc:dd:ee:ff".into());
        assert_eq!(events.len(), 1);

        // Disconnect clears both session and cache
        let events = tracker.on_remove(2);
        assert_eq!(
            events,
            vec![Event::DeviceDisconnect {
                id: "aa:bb:cc:dd:ee:ff".into(),
                device_type: 0,
                device_mode: 2,
            }]
        );

        // Reconnect without rediscovery: cache is gone, no announce
        let events = tracker.on_connect(3, 0xCA10, None);
        assert!(events.is_empty());
    }

    #[test]
    fn test_keyboard_is_tracked_but_silent() {
        let (_dir, mut tracker, _host) = temp_tracker();
        assert!(tracker.on_connect(4, 0x8208, None).is_empty());
        assert!(tracker.session(4).is_some());
        assert_eq!(tracker.audio_usage_page(4), None);
        assert!(tracker.on_remove(4).is_empty());
        assert!(tracker.session(4).is_none());
    }

    #[test]
    fn test_resync_replays_only_announceable_sessions() {
        let (_dir, mut tracker, _host) = temp_tracker();
        tracker.on_connect(1, 0x8266, Some("aa:bb:cc:dd:ee:ff".into()));
        tracker.on_connect(2, 0xCA10, None); // no identifier yet
        tracker.on_connect(3, 0x8208, None); // keyboard, never announced

        let events = tracker.resync();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::DeviceConnect { device_mode: 5, .. }));
    }

    #[test]
    fn test_removed_session_without_identifier_is_silent() {
        let (_dir, mut tracker, _host) = temp_tracker();
        tracker.on_connect(2, 0xCA10, None);
        assert!(tracker.on_remove(2).is_empty());
    }

    #[test]
    fn test_parse_identifier_report() {
        let mut data = vec![0x81, 0x01, 0x10, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(
            parse_identifier_report(&data),
            Some("aa:bb:cc:dd:ee:ff".to_string())
        );

        data[0] = 0x80;
        assert_eq!(parse_identifier_report(&data), None);
        assert_eq!(parse_identifier_report(&[0x81, 0x01, 0x10]), None);
    }

    #[test]
    fn test_null_host_accepts_reports() {
        let cache = IdCache::disabled();
        let mut tracker = SessionTracker::new(cache, Arc::new(NullHost));
        assert!(tracker.on_connect(2, 0xCA10, None).is_empty());
    }
}
