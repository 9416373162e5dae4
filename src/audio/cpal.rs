// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, fmt};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::mixer::{AudioMixer, CHANNELS};

/// An output device as reported by cpal.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub max_channels: u16,
    pub host: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists the output devices of every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    max_channels,
                    host: host_id.name().to_string(),
                });
            }
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

/// A running cpal output stream fed by a mixer. Output stops when this is dropped.
pub struct OutputStream {
    device_name: String,
    _stream: cpal::Stream,
}

impl OutputStream {
    /// Returns the name of the device being played through.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// Starts playing the mixer through the named output device, or through the default device
/// when no name is given.
pub fn start_output(
    mixer: AudioMixer,
    device_name: Option<&str>,
) -> Result<OutputStream, Box<dyn Error>> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => {
            let mut found = None;
            for device in host.output_devices()? {
                if device.name()? == name {
                    found = Some(device);
                    break;
                }
            }
            found.ok_or_else(|| format!("no output device named {}", name))?
        }
        None => host
            .default_output_device()
            .ok_or("no default output device")?,
    };
    let device_name = device.name()?;

    let config = cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: mixer.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / CHANNELS as usize;
            mixer.process_into_output(data, frames);
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    stream.play()?;

    info!(
        device = device_name,
        sample_rate = config.sample_rate,
        "CPAL output stream started"
    );
    Ok(OutputStream {
        device_name,
        _stream: stream,
    })
}
