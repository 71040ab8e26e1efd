//! AI-key press classification
//!
//! The mouse reports AI-key activity as a stream of down reports on the
//! session's audio usage page and a single 1-byte release report on the
//! consumer page. This module turns that stream into discrete semantic
//! events:
//!
//! ```text
//! Idle ──down──▶ Pressed ──(held > 0.5s)──▶ Recording
//!                   │                           │
//!                   └────────release────────────┘──▶ Idle
//! ```
//!
//! A release after >= 1.0 s closes a long press; anything shorter is a
//! click. While Recording, each qualifying down report also carries one
//! compressed audio frame at a fixed payload offset.
//!
//! There is deliberately no watchdog: a session whose release report never
//! arrives stays Pressed/Recording until the next release report or until
//! device removal drops the classifier (see DESIGN.md).
//!
//! All transitions take the report timestamp explicitly so tests control
//! the clock.

use crate::audio::decoder::FRAME_LEN;
use crate::event::{Event, KeyAction, KeyState};
use std::time::{Duration, Instant};

/// Key code reported for the AI key itself
pub const AI_KEY: u16 = 32;

/// Held longer than this, a press becomes a recording
pub const LONG_PRESS_START: Duration = Duration::from_millis(500);

/// Released at or past this, a press is classified long rather than click
pub const LONG_PRESS_MIN: Duration = Duration::from_secs(1);

/// Usage page carrying release reports and discrete key-code reports
pub const CONSUMER_USAGE_PAGE: u32 = 0x0C;

/// Usage tag of the discrete key-code report
pub const KEYCODE_USAGE: u32 = 0xFFFF_FFFF;

/// Byte offset of the compressed audio frame inside a down report
pub const AUDIO_PAYLOAD_OFFSET: usize = 2;

/// Press-tracking state, one per audio-capable session
#[derive(Debug, Clone, Copy)]
enum PressState {
    Idle,
    Pressed { since: Instant },
    Recording { since: Instant },
}

/// What one report amounted to
#[derive(Debug, Default)]
pub struct Outcome {
    /// Button events to broadcast, in order
    pub events: Vec<Event>,
    /// Compressed audio frame to decode (recording path only)
    pub audio_frame: Option<Vec<u8>>,
}

/// Per-session timing state machine for the AI key
pub struct KeyPressClassifier {
    state: PressState,
}

impl KeyPressClassifier {
    pub fn new() -> Self {
        Self {
            state: PressState::Idle,
        }
    }

    /// Whether audio frames are currently being forwarded
    pub fn recording(&self) -> bool {
        matches!(self.state, PressState::Recording { .. })
    }

    /// Classify one input report for this session.
    ///
    /// `audio_usage_page` is the session's own page for down reports;
    /// reports matching neither pattern are ignored.
    pub fn on_report(
        &mut self,
        audio_usage_page: u32,
        usage_page: u32,
        usage: u32,
        data: &[u8],
        at: Instant,
    ) -> Outcome {
        if usage_page == audio_usage_page && data.len() >= 3 && data[0] == 0x01 {
            return self.on_down_report(data, at);
        }

        if usage_page == CONSUMER_USAGE_PAGE && data.len() == 1 && data[0] == 0x00 {
            return self.on_release_report(at);
        }

        classify_keycode(usage_page, usage, data)
    }

    fn on_down_report(&mut self, data: &[u8], at: Instant) -> Outcome {
        let mut outcome = Outcome::default();

        match self.state {
            PressState::Idle => {
                // Speculative click; the release (or the long-press
                // threshold) settles the final classification.
                self.state = PressState::Pressed { since: at };
                tracing::debug!("AI key pressed");
                outcome.events.push(button(KeyState::Down, KeyAction::Click));
            }
            PressState::Pressed { since } => {
                if at.duration_since(since) > LONG_PRESS_START {
                    self.state = PressState::Recording { since };
                    tracing::info!("AI key long press, recording started");
                    outcome
                        .events
                        .push(button(KeyState::Down, KeyAction::LongPressStart));
                    outcome.audio_frame = audio_payload(data);
                }
            }
            PressState::Recording { .. } => {
                outcome.audio_frame = audio_payload(data);
            }
        }

        outcome
    }

    fn on_release_report(&mut self, at: Instant) -> Outcome {
        let mut outcome = Outcome::default();

        let since = match self.state {
            PressState::Idle => return outcome,
            PressState::Pressed { since } | PressState::Recording { since } => since,
        };

        if at.duration_since(since) >= LONG_PRESS_MIN {
            tracing::info!("AI key released, recording ended");
            outcome
                .events
                .push(button(KeyState::Up, KeyAction::LongPressEnd));
        } else {
            tracing::debug!("AI key click");
            outcome.events.push(button(KeyState::Up, KeyAction::Click));
        }

        self.state = PressState::Idle;
        outcome
    }
}

impl Default for KeyPressClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateless path: a 2-byte key-code report on the consumer page.
///
/// This is the only button path for sessions without an audio usage page
/// (the keyboard); audio-capable sessions reach it through
/// [`KeyPressClassifier::on_report`] as the fallthrough case.
pub fn classify_keycode(usage_page: u32, usage: u32, data: &[u8]) -> Outcome {
    if usage_page == CONSUMER_USAGE_PAGE && data.len() == 2 && usage == KEYCODE_USAGE {
        on_keycode_report(data)
    } else {
        Outcome::default()
    }
}

fn on_keycode_report(data: &[u8]) -> Outcome {
    let mut outcome = Outcome::default();
    let code = u16::from_le_bytes([data[0], data[1]]);

    if code == 0 {
        // Key-up marker, nothing to report
        return outcome;
    }

    if let Some(label) = ai_key_label(code) {
        tracing::debug!("Detected {}", label);
        outcome.events.push(Event::Button {
            key: code,
            state: KeyState::Down,
            action: KeyAction::Click,
        });
    }

    outcome
}

fn button(state: KeyState, action: KeyAction) -> Event {
    Event::Button {
        key: AI_KEY,
        state,
        action,
    }
}

fn audio_payload(data: &[u8]) -> Option<Vec<u8>> {
    data.get(AUDIO_PAYLOAD_OFFSET..AUDIO_PAYLOAD_OFFSET + FRAME_LEN)
        .map(|frame| frame.to_vec())
}

/// Fixed table of discrete AI-key codes.
///
/// The keyboard half of the combo assigns one code per shortcut key; new
/// device variants extend this table rather than adding branches.
pub fn ai_key_label(code: u16) -> Option<&'static str> {
    let label = match code {
        0x20 => "AI key",
        0xFF09 => "AI key 1 (long-form writing)",
        0xFF10 => "AI key 2 (agent)",
        0xFF11 => "AI key 3 (slides)",
        0xFF06 => "AI key 4 (planning)",
        0xFF07 => "AI key 5 (work summary)",
        0xFF08 => "AI key 6 (speech draft)",
        0xFF03 => "AI key 7 (text polish)",
        0xFF04 => "AI key 8 (proofreading)",
        0xFF05 => "AI key 9 (reading)",
        0xFF01 => "AI key / (screenshot)",
        0xFF02 => "AI key * (drawing)",
        0xFF12 => "AI key 0 (image recognition)",
        0xFF13 => "AI key . (translation)",
        0xFF14 => "AI key - (transcription)",
        0xFF15 => "AI key + (writing)",
        0xFF16 => "AI key enter (Q&A)",
        _ => return None,
    };
    Some(label)
}
