//! Voxmouse: bridge daemon for AI-key voice mouse hardware
//!
//! This library provides the core functionality for:
//! - Tracking HID device sessions (BLE mouse, 2.4G dongle, BLE keyboard)
//! - Classifying AI-key presses into clicks and long-press recordings
//! - Decoding in-report mSBC audio to PCM16 and cleaning it up
//! - Streaming events to companion-app clients over TCP as framed JSON
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐   PlatformEvent    ┌──────────────┐
//!   │   Platform   │ ─────────────────▶ │     Core     │
//!   │  (HID host)  │ ◀───────────────── │  (one task)  │
//!   └──────────────┘    send_report     └──────────────┘
//!                                              │
//!                   ┌──────────────────────────┼─────────────────┐
//!                   ▼                          ▼                 ▼
//!          ┌──────────────┐           ┌──────────────┐   ┌──────────────┐
//!          │    Device    │           │    Button    │   │    Audio     │
//!          │   sessions   │           │  classifier  │   │ mSBC+denoise │
//!          └──────────────┘           └──────────────┘   └──────────────┘
//!                   │                          │                 │
//!                   └───────── Event ──────────┴─────────────────┘
//!                                              │
//!                                              ▼
//!                                     ┌──────────────┐
//!                                     │  Broadcaster │  JSON + "|||"
//!                                     │ (TCP fanout) │──▶ clients
//!                                     └──────────────┘
//! ```
//!
//! All pipeline state (sessions, press timing, codec, filters) is owned by
//! the single core task; the platform layer and the TCP server only pass
//! messages.

pub mod audio;
pub mod button;
pub mod cache;
pub mod config;
pub mod daemon;
pub mod device;
pub mod error;
pub mod event;
pub mod platform;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use daemon::{Core, Daemon};
pub use error::{Result, VoxmouseError};
pub use event::Event;
