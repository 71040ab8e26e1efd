//! Wire protocol for the companion-app event stream
//!
//! Each message is one JSON envelope `{"type", "status", "data"}` followed
//! immediately by the 3-byte literal `|||`. Messages are concatenated with
//! no other separator, so consumers split on the delimiter, not on newlines.
//!
//! Field names and layouts are fixed per event type and must not change;
//! the companion application matches on them verbatim.

use crate::error::ServerError;
use crate::event::Event;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

/// Message delimiter appended after every JSON envelope
pub const DELIMITER: &[u8; 3] = b"|||";

/// Inbound command a client may send to request a permission check
pub const CMD_CHECK_PERMISSIONS: &str = "CHECK_PERMISSIONS";

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    status: &'a str,
    data: T,
}

#[derive(Serialize)]
struct VoiceData {
    length: usize,
    bytes: String,
    bytes_len: usize,
}

#[derive(Serialize)]
struct ButtonEvent {
    key: u16,
    state: u8,
    action_type: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HardwareConnect<'a> {
    device_id: &'a str,
    device_type: i32,
    device_mode: i32,
    device_mac_address: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HardwareDisconnect<'a> {
    device_id: &'a str,
    device_type: i32,
    device_mode: i32,
}

#[derive(Serialize)]
struct PermissionResult<'a> {
    permission: &'a str,
}

#[derive(Serialize)]
struct StatusMessage<'a> {
    message: &'a str,
}

fn envelope<T: Serialize>(kind: &str, data: T) -> Result<Vec<u8>, ServerError> {
    let mut bytes = serde_json::to_vec(&Envelope {
        kind,
        status: "true",
        data,
    })?;
    bytes.extend_from_slice(DELIMITER);
    Ok(bytes)
}

/// Serialize an event to its framed wire form (JSON + delimiter)
pub fn frame(event: &Event) -> Result<Vec<u8>, ServerError> {
    match event {
        Event::AudioData { pcm } => {
            let bytes = STANDARD.encode(pcm);
            envelope(
                "ON_VOICE_DATA",
                VoiceData {
                    length: pcm.len(),
                    bytes_len: bytes.len(),
                    bytes,
                },
            )
        }
        Event::Button { key, state, action } => envelope(
            "ON_AI_BUTTON_EVENT",
            ButtonEvent {
                key: *key,
                state: state.wire(),
                action_type: action.wire(),
            },
        ),
        Event::DeviceConnect {
            id,
            device_type,
            device_mode,
            mac,
        } => envelope(
            "ON_HARDWARE_CONNECT",
            HardwareConnect {
                device_id: id,
                device_type: *device_type,
                device_mode: *device_mode,
                device_mac_address: mac,
            },
        ),
        Event::DeviceDisconnect {
            id,
            device_type,
            device_mode,
        } => envelope(
            "ON_HARDWARE_DISCONNECT",
            HardwareDisconnect {
                device_id: id,
                device_type: *device_type,
                device_mode: *device_mode,
            },
        ),
        Event::Permission { granted } => envelope(
            "ON_CHECK_PERMISSIONS",
            PermissionResult {
                permission: if *granted { "AUTHORIZED" } else { "DENIED" },
            },
        ),
        Event::Status { text } => envelope("ON_STATUS_MESSAGE", StatusMessage { message: text }),
    }
}

/// Split a byte stream into messages on the `|||` delimiter.
///
/// Returns the complete messages and the unconsumed tail (a partial message
/// still waiting for its delimiter).
pub fn split_frames(buf: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let mut frames = Vec::new();
    let mut rest = buf;

    while let Some(pos) = find_delimiter(rest) {
        frames.push(&rest[..pos]);
        rest = &rest[pos + DELIMITER.len()..];
    }

    (frames, rest)
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyAction, KeyState};

    #[test]
    fn test_voice_data_layout() {
        // Little-endian PCM16: 0x1234 -> [0x34, 0x12]
        let event = Event::AudioData {
            pcm: vec![0x34, 0x12, 0x78, 0x56],
        };
        let framed = frame(&event).unwrap();
        assert!(framed.ends_with(DELIMITER));

        let json: serde_json::Value =
            serde_json::from_slice(&framed[..framed.len() - DELIMITER.len()]).unwrap();
        assert_eq!(json["type"], "ON_VOICE_DATA");
        assert_eq!(json["status"], "true");
        assert_eq!(json["data"]["length"], 4);

        let decoded = STANDARD
            .decode(json["data"]["bytes"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, vec![0x34, 0x12, 0x78, 0x56]);
        assert_eq!(
            json["data"]["bytes_len"].as_u64().unwrap() as usize,
            json["data"]["bytes"].as_str().unwrap().len()
        );
    }

    #[test]
    fn test_button_event_layout() {
        let event = Event::Button {
            key: 32,
            state: KeyState::Down,
            action: KeyAction::LongPressStart,
        };
        let framed = frame(&event).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&framed[..framed.len() - DELIMITER.len()]).unwrap();
        assert_eq!(json["type"], "ON_AI_BUTTON_EVENT");
        assert_eq!(json["data"]["key"], 32);
        assert_eq!(json["data"]["state"], 1);
        assert_eq!(json["data"]["action_type"], 2);
    }

    #[test]
    fn test_hardware_connect_layout() {
        let event = Event::DeviceConnect {
            id: "aa:bb:cc:dd:ee:ff".into(),
            device_type: 0,
            device_mode: 2,
            mac: "aa:bb:cc:dd:ee:ff".into(),
        };
        let framed = frame(&event).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&framed[..framed.len() - DELIMITER.len()]).unwrap();
        assert_eq!(json["type"], "ON_HARDWARE_CONNECT");
        assert_eq!(json["data"]["deviceId"], "aa:bb:cc:dd:ee:ff");
        assert_eq!(json["data"]["deviceType"], 0);
        assert_eq!(json["data"]["deviceMode"], 2);
        assert_eq!(json["data"]["deviceMacAddress"], "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_permission_layout() {
        let framed = frame(&Event::Permission { granted: true }).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&framed[..framed.len() - DELIMITER.len()]).unwrap();
        assert_eq!(json["type"], "ON_CHECK_PERMISSIONS");
        assert_eq!(json["data"]["permission"], "AUTHORIZED");

        let framed = frame(&Event::Permission { granted: false }).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&framed[..framed.len() - DELIMITER.len()]).unwrap();
        assert_eq!(json["data"]["permission"], "DENIED");
    }

    #[test]
    fn test_round_trip_preserves_order_and_count() {
        let events = vec![
            Event::Status {
                text: "ready".into(),
            },
            Event::Button {
                key: 32,
                state: KeyState::Down,
                action: KeyAction::Click,
            },
            Event::AudioData {
                pcm: vec![1, 2, 3, 4],
            },
            Event::DeviceDisconnect {
                id: "aa:bb:cc:dd:ee:ff".into(),
                device_type: 0,
                device_mode: 5,
            },
        ];

        let mut stream = Vec::new();
        for event in &events {
            stream.extend_from_slice(&frame(event).unwrap());
        }

        let (frames, rest) = split_frames(&stream);
        assert!(rest.is_empty());
        assert_eq!(frames.len(), events.len());

        let types: Vec<String> = frames
            .iter()
            .map(|f| {
                let json: serde_json::Value = serde_json::from_slice(f).unwrap();
                json["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            types,
            vec![
                "ON_STATUS_MESSAGE",
                "ON_AI_BUTTON_EVENT",
                "ON_VOICE_DATA",
                "ON_HARDWARE_DISCONNECT",
            ]
        );
    }

    #[test]
    fn test_split_keeps_partial_tail() {
        let mut stream = frame(&Event::Status { text: "a".into() }).unwrap();
        stream.extend_from_slice(b"{\"type\":\"ON_VOICE");

        let (frames, rest) = split_frames(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(rest, b"{\"type\":\"ON_VOICE");
    }
}
