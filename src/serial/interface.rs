use std::io::Read;
use std::time::Duration;
use serialport::{SerialPort, SerialPortType};

use super::{LineBuffer, Result, SerialDeviceInfo, SerialError};

/// Read timeout handed to the OS driver. Reads are only issued once
/// `bytes_to_read` reports data, so this bounds a stalled driver only.
const READ_TIMEOUT_MS: u64 = 100;
const READ_CHUNK: usize = 512;

/// Byte-level access to an open serial link.
pub trait SerialTransport: Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> Result<u32>;

    /// Read up to `buffer.len()` bytes.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

impl SerialTransport for Box<dyn SerialPort> {
    fn bytes_to_read(&mut self) -> Result<u32> {
        Ok(SerialPort::bytes_to_read(&**self)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(Read::read(self, buffer)?)
    }
}

/// Opens candidate ports by name.
#[async_trait::async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(&self, port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>>;
}

/// Opens real OS serial devices through `serialport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl SystemPorts {
    /// List the serial ports the OS currently reports.
    pub fn available_ports() -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb_info) => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                },
                _ => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: None,
                    pid: None,
                    manufacturer: None,
                    product: None,
                },
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl PortOpener for SystemPorts {
    async fn open(&self, port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        let name = port_name.to_string();
        let opened = tokio::task::spawn_blocking(move || {
            serialport::new(name, baud_rate)
                .timeout(Duration::from_millis(READ_TIMEOUT_MS))
                .open()
        })
        .await
        .map_err(|e| SerialError::PortOpen {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;

        let port = opened.map_err(|e| SerialError::PortOpen {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(port))
    }
}

/// An open link plus the line assembly state for it.
pub struct SerialInterface {
    port_name: String,
    transport: Option<Box<dyn SerialTransport>>,
    lines: LineBuffer,
}

impl SerialInterface {
    /// Open `port_name` at `baud_rate` through `opener`.
    pub async fn open(opener: &dyn PortOpener, port_name: &str, baud_rate: u32) -> Result<Self> {
        let transport = opener.open(port_name, baud_rate).await?;
        log::debug!("Opened {} at {} baud", port_name, baud_rate);
        Ok(Self {
            port_name: port_name.to_string(),
            transport: Some(transport),
            lines: LineBuffer::new(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Read whatever is waiting and return the lines it completed.
    ///
    /// Returns an empty vector when nothing is pending. On error the
    /// partially assembled line is discarded.
    pub fn poll_lines(&mut self) -> Result<Vec<String>> {
        let transport = self.transport.as_mut().ok_or(SerialError::Closed)?;

        let result = read_pending(&mut **transport, &mut self.lines);
        if result.is_err() {
            self.lines.clear();
        }
        result
    }

    /// Drop the unterminated tail, e.g. when a handshake window is abandoned.
    pub fn discard_partial(&mut self) {
        self.lines.clear();
    }

    /// Release the OS handle.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            log::info!("Closed {}", self.port_name);
        }
        self.lines.clear();
    }
}

fn read_pending(transport: &mut dyn SerialTransport, lines: &mut LineBuffer) -> Result<Vec<String>> {
    let pending = transport.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(Vec::new());
    }
    let mut buffer = [0u8; READ_CHUNK];
    let wanted = pending.min(buffer.len());
    let n = transport.read(&mut buffer[..wanted])?;
    Ok(lines.push(&buffer[..n]))
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.close();
    }
}
