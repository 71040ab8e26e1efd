//! Internal event stream
//!
//! Everything the daemon tells clients about flows through this one tagged
//! union: decoded audio, AI-key button activity, device lifecycle,
//! permission replies, and status text. Events are immutable once built and
//! carry no reference back to the session that produced them, so the
//! broadcaster is decoupled from device lifetime.

/// Button state on the wire: 0 = up, 1 = down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Up,
    Down,
}

impl KeyState {
    /// Wire encoding for the `state` field
    pub fn wire(self) -> u8 {
        match self {
            KeyState::Up => 0,
            KeyState::Down => 1,
        }
    }
}

/// Semantic classification of a button report.
///
/// `Click` covers both the speculative down event and a short-press release.
/// The two long-press variants share wire value 2; the `state` field tells
/// start (down) from end (up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Click,
    LongPressStart,
    LongPressEnd,
}

impl KeyAction {
    /// Wire encoding for the `action_type` field: 0 = click, 2 = long-press
    pub fn wire(self) -> u8 {
        match self {
            KeyAction::Click => 0,
            KeyAction::LongPressStart | KeyAction::LongPressEnd => 2,
        }
    }
}

/// One entry in the ordered event stream delivered to clients
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A block of decoded, denoised PCM16 audio (little-endian bytes)
    AudioData { pcm: Vec<u8> },

    /// AI-key or discrete-key activity
    Button {
        key: u16,
        state: KeyState,
        action: KeyAction,
    },

    /// A device session became announceable (identifier known)
    DeviceConnect {
        id: String,
        device_type: i32,
        device_mode: i32,
        mac: String,
    },

    /// A device session ended
    DeviceDisconnect {
        id: String,
        device_type: i32,
        device_mode: i32,
    },

    /// Reply to the CHECK_PERMISSIONS client command
    Permission { granted: bool },

    /// Free-form status text (e.g. platform-layer failures)
    Status { text: String },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::AudioData { pcm } => write!(f, "AudioData({} bytes)", pcm.len()),
            Event::Button { key, state, action } => {
                write!(f, "Button(key={key}, {state:?}, {action:?})")
            }
            Event::DeviceConnect { id, device_mode, .. } => {
                write!(f, "DeviceConnect({id}, mode={device_mode})")
            }
            Event::DeviceDisconnect { id, device_mode, .. } => {
                write!(f, "DeviceDisconnect({id}, mode={device_mode})")
            }
            Event::Permission { granted } => write!(f, "Permission(granted={granted})"),
            Event::Status { text } => write!(f, "Status({text:?})"),
        }
    }
}
