//! nusb transport for the SmartScope
//!
//! Opens the device, claims interface 0 and keeps the three bulk endpoints
//! open for the lifetime of the transport. Each [`Transport`] call maps to
//! exactly one blocking bulk transfer.

use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{DeviceInfo, Endpoint as UsbEndpoint, Interface, MaybeFuture};
use smartscope_core::protocol::{
    firmware_file_name, hardware_revision, EP_CMD_IN, EP_CMD_OUT, EP_DATA, RESPONSE_SIZE,
    SMARTSCOPE_USB_PRODUCT, SMARTSCOPE_USB_VENDOR, USB_INTERFACE,
};
use smartscope_core::{Endpoint, Scope, Transport, TransportError};

use crate::error::{Result, UsbError};

/// Configuration options for opening a SmartScope
#[derive(Debug, Clone, Default)]
pub struct UsbConfig {
    /// Device index (when multiple devices are connected)
    pub device_index: usize,
    /// USB serial number to search for
    pub serial: Option<String>,
}

/// Parse options from key=value pairs
pub fn parse_options(options: &[(&str, &str)]) -> Result<UsbConfig> {
    let mut config = UsbConfig::default();

    for (key, value) in options {
        match *key {
            "device" | "index" => {
                config.device_index = value
                    .parse()
                    .map_err(|_| UsbError::InvalidParameter(format!("index: {}", value)))?;
            }
            "serial" => {
                config.serial = Some(value.to_string());
            }
            _ => {
                return Err(UsbError::InvalidParameter(format!(
                    "unknown option: {}",
                    key
                )));
            }
        }
    }

    Ok(config)
}

/// Split a `key=value,key=value` option string into pairs
pub fn split_options(options: &str) -> Result<Vec<(&str, &str)>> {
    options
        .split(',')
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .map(|opt| {
            opt.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| UsbError::InvalidParameter(format!("expected key=value: {}", opt)))
        })
        .collect()
}

/// Information about a connected SmartScope
#[derive(Debug, Clone)]
pub struct ScopeDeviceInfo {
    /// USB bus identifier
    pub bus: String,
    /// Device address on the bus
    pub address: u8,
    /// USB serial number
    pub serial: Option<String>,
}

impl ScopeDeviceInfo {
    fn from_nusb(info: &DeviceInfo) -> Self {
        Self {
            bus: info.bus_id().to_string(),
            address: info.device_address(),
            serial: info.serial_number().map(str::to_string),
        }
    }

    /// Hardware revision, the last three characters of the serial number
    pub fn hardware_revision(&self) -> Option<&str> {
        self.serial.as_deref().and_then(hardware_revision)
    }

    /// FPGA bitstream file matching this device
    pub fn firmware_file_name(&self) -> Option<String> {
        self.hardware_revision().map(firmware_file_name)
    }
}

fn smartscopes() -> Result<Vec<DeviceInfo>> {
    Ok(nusb::list_devices()
        .wait()
        .map_err(|e| UsbError::OpenFailed(e.to_string()))?
        .filter(|d| {
            d.vendor_id() == SMARTSCOPE_USB_VENDOR && d.product_id() == SMARTSCOPE_USB_PRODUCT
        })
        .collect())
}

/// List all connected SmartScopes
pub fn list_devices() -> Result<Vec<ScopeDeviceInfo>> {
    Ok(smartscopes()?
        .iter()
        .map(ScopeDeviceInfo::from_nusb)
        .collect())
}

/// Open a SmartScope and wrap it in a session
pub fn open(config: &UsbConfig) -> Result<Scope<UsbTransport>> {
    Ok(Scope::new(UsbTransport::open(config)?))
}

fn map_transfer_error(e: TransferError) -> TransportError {
    match e {
        TransferError::Cancelled => TransportError::Timeout,
        TransferError::Stall => TransportError::Stall,
        TransferError::Disconnected => TransportError::Disconnected,
        other => TransportError::Io(other.to_string()),
    }
}

/// Trim a packet-rounded IN transfer back to the caller's length
///
/// Bytes past `max_len` are device data the request did not ask for; they
/// are dropped and reported.
fn fit_to_request(mut data: Vec<u8>, max_len: usize) -> Vec<u8> {
    if data.len() > max_len {
        log::warn!(
            "Discarding {} bytes received past the requested {} bytes",
            data.len() - max_len,
            max_len
        );
        data.truncate(max_len);
    }
    data
}

/// Bulk transport over nusb
pub struct UsbTransport {
    _interface: Interface,
    cmd_out: UsbEndpoint<Bulk, Out>,
    cmd_in: UsbEndpoint<Bulk, In>,
    data_in: UsbEndpoint<Bulk, In>,
    info: ScopeDeviceInfo,
}

impl UsbTransport {
    /// Open the SmartScope selected by `config`
    pub fn open(config: &UsbConfig) -> Result<Self> {
        let devices = smartscopes()?;

        let device_info = match &config.serial {
            Some(serial) => devices
                .iter()
                .find(|d| d.serial_number() == Some(serial.as_str())),
            None => devices.get(config.device_index),
        }
        .ok_or(UsbError::DeviceNotFound)?;

        Self::open_device(device_info)
    }

    fn open_device(device_info: &DeviceInfo) -> Result<Self> {
        let info = ScopeDeviceInfo::from_nusb(device_info);
        log::info!(
            "Opening SmartScope at bus {} address {} (serial {})",
            info.bus,
            info.address,
            info.serial.as_deref().unwrap_or("unknown")
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        let interface = device
            .claim_interface(USB_INTERFACE)
            .wait()
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;

        let claim = |e: nusb::Error| UsbError::ClaimFailed(e.to_string());
        let cmd_out = interface.endpoint::<Bulk, Out>(EP_CMD_OUT).map_err(claim)?;
        let cmd_in = interface.endpoint::<Bulk, In>(EP_CMD_IN).map_err(claim)?;
        let data_in = interface.endpoint::<Bulk, In>(EP_DATA).map_err(claim)?;

        Ok(Self {
            _interface: interface,
            cmd_out,
            cmd_in,
            data_in,
            info,
        })
    }

    /// Bus location and serial number of the opened device
    pub fn info(&self) -> &ScopeDeviceInfo {
        &self.info
    }

    fn bulk_in(
        ep: &mut UsbEndpoint<Bulk, In>,
        max_len: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        // IN requests must be a multiple of the packet size
        let max_packet_size = ep.max_packet_size();
        let request_len = max_len.div_ceil(max_packet_size) * max_packet_size;
        let mut buf = Buffer::new(request_len);
        buf.set_requested_len(request_len);

        let completion = ep.transfer_blocking(buf, timeout);
        completion.status.map_err(map_transfer_error)?;

        Ok(fit_to_request(completion.buffer.to_vec(), max_len))
    }
}

impl Transport for UsbTransport {
    fn write_command(
        &mut self,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        let mut buf = Buffer::new(data.len());
        buf.extend_from_slice(data);

        let completion = self.cmd_out.transfer_blocking(buf, timeout);
        completion.status.map_err(map_transfer_error)?;
        Ok(completion.actual_len)
    }

    fn read_response(&mut self, timeout: Duration) -> std::result::Result<Vec<u8>, TransportError> {
        Self::bulk_in(&mut self.cmd_in, RESPONSE_SIZE, timeout)
    }

    fn read_stream(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        Self::bulk_in(&mut self.data_in, max_len, timeout)
    }

    fn clear_halt(&mut self, endpoint: Endpoint) -> std::result::Result<(), TransportError> {
        log::debug!("clearing halt on endpoint 0x{:02X}", endpoint.address());
        let result = match endpoint {
            Endpoint::CommandOut => self.cmd_out.clear_halt().wait(),
            Endpoint::CommandIn => self.cmd_in.clear_halt().wait(),
            Endpoint::Data => self.data_in.clear_halt().wait(),
        };
        result.map_err(|e| TransportError::Io(e.to_string()))
    }
}
