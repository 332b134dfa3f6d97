// Copyright (c) 2024 Mike Tsao

//! Sends sequencer output to a MIDI port through
//! [midir](https://crates.io/crates/midir).

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use rulebeat::{
    instruments::{DeviceError, Instrument},
    types::{MidiChannel, MidiMessage, MidiPortDescriptor},
    util::MidiUtils,
};

const CLIENT_NAME: &str = "rulebeat";

/// Lists the MIDI output ports the system knows about right now.
pub fn list_output_ports() -> anyhow::Result<Vec<MidiPortDescriptor>> {
    let output = MidiOutput::new(CLIENT_NAME)?;
    Ok(output
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            output
                .port_name(port)
                .ok()
                .map(|name| MidiPortDescriptor { index, name })
        })
        .collect())
}

/// Which output port a [MidirInstrument] connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortSelector {
    /// The n-th port, in the order [list_output_ports()] reports them.
    Index(usize),
    /// The first port whose name equals, or failing that contains, this text.
    Name(String),
}

/// An [Instrument] that writes to a MIDI output port.
///
/// The port is looked up and connected on [Instrument::open()], so ports that
/// appear after the instrument is built are still found.
pub struct MidirInstrument {
    name: String,
    port: PortSelector,
    connection: Option<MidiOutputConnection>,
}
impl core::fmt::Debug for MidirInstrument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MidirInstrument")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("is_open", &self.connection.is_some())
            .finish()
    }
}
impl MidirInstrument {
    /// An instrument that players reach as `name`, bound to `port`.
    pub fn new_with(name: &str, port: PortSelector) -> Self {
        Self {
            name: name.to_string(),
            port,
            connection: None,
        }
    }

    #[allow(missing_docs)]
    pub fn port(&self) -> &PortSelector {
        &self.port
    }

    fn find_port(&self, output: &MidiOutput) -> Option<MidiOutputPort> {
        let ports = output.ports();
        match &self.port {
            PortSelector::Index(index) => ports.get(*index).cloned(),
            PortSelector::Name(wanted) => {
                let named: Vec<(MidiOutputPort, String)> = ports
                    .into_iter()
                    .filter_map(|p| output.port_name(&p).ok().map(|name| (p, name)))
                    .collect();
                named
                    .iter()
                    .find(|(_, name)| name == wanted)
                    .or_else(|| named.iter().find(|(_, name)| name.contains(wanted.as_str())))
                    .map(|(p, _)| p.clone())
            }
        }
    }

    fn unavailable(&self, reason: impl core::fmt::Display) -> DeviceError {
        log::warn!("Couldn't open MIDI output for {}: {reason}", self.name);
        DeviceError::Unavailable(self.name.clone())
    }
}
impl Instrument for MidirInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let output = MidiOutput::new(CLIENT_NAME).map_err(|e| self.unavailable(e))?;
        let port = self
            .find_port(&output)
            .ok_or_else(|| self.unavailable(format!("no port matches {:?}", self.port)))?;
        let port_name = output.port_name(&port).unwrap_or_default();
        let connection = output
            .connect(&port, &self.name)
            .map_err(|e| self.unavailable(e))?;
        log::info!("{} connected to MIDI output {port_name}", self.name);
        self.connection = Some(connection);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("{} disconnected", self.name);
        }
    }

    fn send(&mut self, channel: MidiChannel, message: MidiMessage) -> Result<(), DeviceError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(DeviceError::Unavailable(self.name.clone()));
        };
        connection
            .send(&MidiUtils::to_bytes(channel, message))
            .map_err(|e| DeviceError::Send(self.name.clone(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_instrument_refuses_messages() {
        let mut i = MidirInstrument::new_with("synth", PortSelector::Name("nothing".into()));
        assert_eq!(i.name(), "synth");
        assert!(!i.is_open());
        assert_eq!(
            i.note_on(MidiChannel::default(), 60, 100),
            Err(DeviceError::Unavailable("synth".to_string()))
        );
        i.close();
        assert!(!i.is_open());
    }

    #[test]
    fn bad_data_is_caught_before_the_device() {
        let mut i = MidirInstrument::new_with("synth", PortSelector::Index(0));
        assert!(matches!(
            i.note_on(MidiChannel::default(), 200, 100),
            Err(DeviceError::InvalidData(_))
        ));
    }
}
