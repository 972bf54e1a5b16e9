// MIDI input: device listing, a single active connection, and decoding of
// raw messages into semantic events.
//
// The midir callback runs on its own thread and only forwards decoded
// messages over a channel; the loop drains them once per tick.

use crossbeam_channel::{Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use tracing::{debug, info};

use crate::error::MidiError;

const CLIENT_NAME: &str = "scansynth";

/// Decoded channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiMessage {
    /// Parse raw MIDI bytes. Anything the instrument doesn't use is `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;
        let (d1, d2) = match data {
            [d1, d2, ..] => (*d1 & 0x7F, *d2 & 0x7F),
            _ => return None,
        };
        match status & 0xF0 {
            // note-on with zero velocity is a note-off by convention
            0x90 if d2 > 0 => Some(MidiMessage::NoteOn { channel, note: d1, velocity: d2 }),
            0x90 | 0x80 => Some(MidiMessage::NoteOff { channel, note: d1 }),
            0xB0 => Some(MidiMessage::ControlChange { channel, controller: d1, value: d2 }),
            _ => None,
        }
    }
}

/// MIDI input device info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiInputDevice {
    pub name: String,
    pub index: usize,
}

/// Holds at most one live input connection.
pub struct MidiInputHandler {
    connection: Option<(MidiInputConnection<()>, String)>,
    tx: Sender<MidiMessage>,
    rx: Receiver<MidiMessage>,
}

impl MidiInputHandler {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(256);
        Self { connection: None, tx, rx }
    }

    /// List available MIDI input devices
    pub fn list_devices() -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let devices = midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in.port_name(port).ok().map(|name| MidiInputDevice { name, index })
            })
            .collect();
        Ok(devices)
    }

    pub fn current(&self) -> Option<&str> {
        self.connection.as_ref().map(|(_, name)| name.as_str())
    }

    /// Connect to the first device whose name contains `device_name`.
    pub fn connect(&mut self, device_name: &str) -> Result<(), MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).is_ok_and(|n| n.contains(device_name)))
            .ok_or_else(|| MidiError::NotFound(device_name.to_string()))?;
        self.attach(midi_in, port)
    }

    pub fn connect_by_index(&mut self, index: usize) -> Result<(), MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let port = midi_in
            .ports()
            .get(index)
            .cloned()
            .ok_or_else(|| MidiError::NotFound(format!("#{index}")))?;
        self.attach(midi_in, port)
    }

    /// Step to the next device, wrapping. Returns the new device name.
    pub fn cycle(&mut self) -> Result<String, MidiError> {
        let devices = Self::list_devices()?;
        if devices.is_empty() {
            return Err(MidiError::NotFound("any input".into()));
        }
        let next = match self.current() {
            Some(name) => devices
                .iter()
                .position(|d| d.name == name)
                .map_or(0, |i| (i + 1) % devices.len()),
            None => 0,
        };
        self.connect_by_index(devices[next].index)?;
        Ok(devices[next].name.clone())
    }

    fn attach(&mut self, mut midi_in: MidiInput, port: MidiInputPort) -> Result<(), MidiError> {
        // the old listener goes first so no stale callback can fire after the switch
        self.disconnect();

        let name = midi_in.port_name(&port).unwrap_or_else(|_| "unknown".into());
        midi_in.ignore(Ignore::Sysex | Ignore::Time | Ignore::ActiveSense);
        let tx = self.tx.clone();
        let connection = midi_in
            .connect(
                &port,
                "scansynth-input",
                move |_timestamp_us, bytes, _| {
                    if let Some(msg) = MidiMessage::from_bytes(bytes) {
                        let _ = tx.try_send(msg);
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        info!(device = %name, "midi input connected");
        self.connection = Some((connection, name));
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some((connection, name)) = self.connection.take() {
            connection.close();
            // drop anything the old device queued
            while self.rx.try_recv().is_ok() {}
            debug!(device = %name, "midi input closed");
        }
    }

    /// Receive all pending MIDI messages (non-blocking)
    pub fn drain(&self) -> Vec<MidiMessage> {
        self.rx.try_iter().collect()
    }
}

impl Default for MidiInputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_channel_messages() {
        assert_eq!(
            MidiMessage::from_bytes(&[0x93, 60, 100]),
            Some(MidiMessage::NoteOn { channel: 3, note: 60, velocity: 100 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x90, 60, 0]),
            Some(MidiMessage::NoteOff { channel: 0, note: 60 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x81, 61, 40]),
            Some(MidiMessage::NoteOff { channel: 1, note: 61 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, 1, 127]),
            Some(MidiMessage::ControlChange { channel: 0, controller: 1, value: 127 })
        );
    }

    #[test]
    fn ignores_short_and_unused_messages() {
        assert_eq!(MidiMessage::from_bytes(&[]), None);
        assert_eq!(MidiMessage::from_bytes(&[0x90, 60]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xC0, 5, 0]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xE0, 0, 64]), None);
    }

    #[test]
    fn current_reflects_last_cycle_outcome() {
        // whatever ports this machine has, a failed cycle must not leave a stale name
        let mut h = MidiInputHandler::new();
        let result = h.cycle();
        assert_eq!(h.current().is_some(), result.is_ok());
        if let Ok(name) = result {
            assert_eq!(h.current(), Some(name.as_str()));
        }
        h.disconnect();
        assert!(h.current().is_none());
    }

    #[test]
    fn fresh_handler_has_no_binding() {
        let mut h = MidiInputHandler::new();
        assert!(h.current().is_none());
        assert!(h.drain().is_empty());
        h.disconnect();
    }
}
