/*
Serial link interface, for commanding through a radio or an umbilical
attached to a serial port. Built on the serialport crate, reads come back
chunked by whatever was sitting in the driver buffer.
*/

use super::{ComInterface, COM_BUFFER_SIZE};
use serialport::SerialPort;
use std::io::{Error, ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

pub struct SerialComInterface {
    device: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialComInterface {
    pub fn new(device: String, baud_rate: u32) -> SerialComInterface {
        SerialComInterface {
            device,
            baud_rate,
            port: None,
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, Error> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "serial interface is not open"))
    }
}

impl ComInterface for SerialComInterface {
    fn open(&mut self) -> Result<(), Error> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.device, self.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.port = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let port = self.port_mut()?;
        let mut packets = Vec::new();
        let mut buffer = [0u8; COM_BUFFER_SIZE];
        loop {
            let pending = port
                .bytes_to_read()
                .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
            if pending == 0 {
                break;
            }
            let to_read = (pending as usize).min(COM_BUFFER_SIZE);
            port.read_exact(&mut buffer[..to_read])?;
            packets.push(buffer[..to_read].to_vec());
        }
        Ok(packets)
    }

    fn data_available(&mut self, timeout: Duration) -> Result<usize, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let port = self.port_mut()?;
            let pending = port
                .bytes_to_read()
                .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
            if pending > 0 {
                return Ok(pending as usize);
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardware-in-the-loop reads need an actual device node, so only the
    // closed-interface error paths are covered here.
    #[test]
    fn test_closed_serial_interface_errors() {
        let mut interface = SerialComInterface::new("/dev/null-serial".to_string(), 9600);
        assert!(!interface.is_open());
        assert!(interface.send(&[0]).is_err());
        assert!(interface.receive().is_err());
        assert!(interface
            .data_available(Duration::from_millis(1))
            .is_err());
    }
}
