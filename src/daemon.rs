//! Daemon orchestration
//!
//! `Core` is the synchronous heart of the bridge: it consumes normalized
//! platform events one at a time and turns them into client events. All
//! session, press, and codec state lives here, owned by a single task, so
//! no pipeline state needs locking. `Daemon::run` wires the core between
//! the platform channel and the TCP server and drives it until Ctrl-C.

use crate::audio::{pcm_to_bytes, Denoiser, FrameDecoder};
use crate::button::{self, KeyPressClassifier};
use crate::cache::IdCache;
use crate::config::{Config, PipelineConfig};
use crate::device::{self, DeviceHandle, SessionTracker};
use crate::event::Event;
use crate::platform::{DeviceHost, PermissionProbe, PlatformEvent, StaticProbe};
use crate::server::{Broadcaster, Server, ServerNotice};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Synchronous report-processing pipeline.
///
/// One platform event in, zero or more client events out. Timestamps come
/// from the caller so press timing is testable without sleeping.
pub struct Core {
    pipeline: PipelineConfig,
    tracker: SessionTracker,
    classifiers: HashMap<DeviceHandle, KeyPressClassifier>,
    denoisers: HashMap<DeviceHandle, Denoiser>,
    decoder: FrameDecoder,
}

impl Core {
    pub fn new(pipeline: PipelineConfig, tracker: SessionTracker) -> Self {
        Self {
            pipeline,
            tracker,
            classifiers: HashMap::new(),
            denoisers: HashMap::new(),
            decoder: FrameDecoder::new(),
        }
    }

    /// Process one platform event observed at `now`
    pub fn handle(&mut self, event: PlatformEvent, now: Instant) -> Vec<Event> {
        match event {
            PlatformEvent::DeviceAttached {
                handle,
                product_id,
                identifier,
            } => self.tracker.on_connect(handle, product_id, identifier),

            PlatformEvent::DeviceDetached { handle } => {
                self.classifiers.remove(&handle);
                self.denoisers.remove(&handle);
                self.tracker.on_remove(handle)
            }

            PlatformEvent::InputReport {
                handle,
                usage_page,
                usage,
                data,
            } => self.on_report(handle, usage_page, usage, &data, now),

            PlatformEvent::Status { text } => vec![Event::Status { text }],
        }
    }

    /// Replay device state for a newly attached client
    pub fn resync(&self) -> Vec<Event> {
        self.tracker.resync()
    }

    fn on_report(
        &mut self,
        handle: DeviceHandle,
        usage_page: u32,
        usage: u32,
        data: &[u8],
        now: Instant,
    ) -> Vec<Event> {
        if let Some(id) = device::parse_identifier_report(data) {
            return self.tracker.on_identifier_discovered(handle, id);
        }

        let Some(session) = self.tracker.session(handle) else {
            tracing::trace!("Report from untracked handle {}", handle);
            return Vec::new();
        };

        // Only audio-capable sessions hold press state; anything else (the
        // keyboard) gets the stateless key-code path alone.
        let outcome = match session.audio_usage_page {
            Some(audio_page) => self
                .classifiers
                .entry(handle)
                .or_default()
                .on_report(audio_page, usage_page, usage, data, now),
            None => button::classify_keycode(usage_page, usage, data),
        };

        let mut events = outcome.events;
        if let Some(frame) = outcome.audio_frame {
            if let Some(pcm) = self.decode_frame(handle, &frame) {
                events.push(Event::AudioData { pcm });
            }
        }
        events
    }

    /// Decode and clean one compressed frame. A codec error costs exactly
    /// this frame.
    fn decode_frame(&mut self, handle: DeviceHandle, frame: &[u8]) -> Option<Vec<u8>> {
        if !self.pipeline.decode {
            return None;
        }

        match self.decoder.decode(frame) {
            Ok(mut samples) => {
                if self.pipeline.denoise {
                    self.denoisers
                        .entry(handle)
                        .or_default()
                        .process(&mut samples);
                }
                Some(pcm_to_bytes(&samples))
            }
            Err(e) => {
                tracing::debug!("Dropping undecodable audio frame: {}", e);
                None
            }
        }
    }
}

/// Long-running bridge daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C or the platform event source closes.
    ///
    /// `platform_rx` delivers everything the HID layer observes; `host` is
    /// the outbound path back to the hardware; `probe` answers permission
    /// checks (ignored when the check is disabled in config).
    pub async fn run(
        self,
        mut platform_rx: mpsc::UnboundedReceiver<PlatformEvent>,
        host: Arc<dyn DeviceHost>,
        probe: Arc<dyn PermissionProbe>,
    ) -> crate::error::Result<()> {
        let cache = if self.config.pipeline.persistence {
            IdCache::at_default_location()
        } else {
            tracing::info!("Identifier persistence disabled");
            IdCache::disabled()
        };

        let probe: Arc<dyn PermissionProbe> = if self.config.pipeline.permission_check {
            probe
        } else {
            tracing::info!("Permission checks disabled, always answering authorized");
            Arc::new(StaticProbe(true))
        };

        let server = Server::bind(&self.config.listen_addr()).await?;
        let broadcaster = Broadcaster::new();
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        tokio::spawn(server.run(broadcaster.clone(), probe, notice_tx));

        let mut core = Core::new(
            self.config.pipeline,
            SessionTracker::new(cache, host),
        );

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                maybe = platform_rx.recv() => {
                    let Some(event) = maybe else {
                        tracing::warn!("Platform event source closed, shutting down");
                        break;
                    };
                    for out in core.handle(event, Instant::now()) {
                        tracing::trace!("Broadcasting {}", out);
                        broadcaster.broadcast(&out);
                    }
                }
                Some(notice) = notice_rx.recv() => {
                    match notice {
                        ServerNotice::ClientAttached => {
                            for out in core.resync() {
                                broadcaster.broadcast(&out);
                            }
                        }
                    }
                }
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        tracing::warn!("Signal handler failed: {}", e);
                    }
                    tracing::info!("Shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
