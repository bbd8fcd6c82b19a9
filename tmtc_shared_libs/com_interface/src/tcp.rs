/*
TCP client interface for commanding a spacecraft simulator or a TMTC bridge
over localhost or the ground network.

Reads are non blocking. One receive() call drains whatever the kernel has
buffered, each read chunk is handed up as one buffer. Stream framing beyond
that is left to the packet layer.
*/

use super::{ComInterface, COM_BUFFER_SIZE};
use log::warn;
use std::io::{Error, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

pub struct TcpComInterface {
    ip: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpComInterface {
    pub fn new(ip: String, port: u16) -> TcpComInterface {
        TcpComInterface {
            ip,
            port,
            stream: None,
        }
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, Error> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "TCP interface is not open"))
    }
}

impl ComInterface for TcpComInterface {
    fn open(&mut self) -> Result<(), Error> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect(format!("{}:{}", self.ip, self.port))?;
        stream.set_nonblocking(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(stream) = self.stream.take() {
            // Not much to be done about shutdown errors on a dying socket
            let _ = stream.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let stream = self.stream_mut()?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let mut packets = Vec::new();
        let mut peer_closed = false;
        {
            let stream = self.stream_mut()?;
            let mut buffer = [0u8; COM_BUFFER_SIZE];
            loop {
                match stream.read(&mut buffer) {
                    Ok(0) => {
                        peer_closed = true;
                        break;
                    }
                    Ok(n) => packets.push(buffer[..n].to_vec()),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e),
                }
            }
        }
        if peer_closed {
            warn!("TCP peer closed the connection");
            self.close()?;
        }
        Ok(packets)
    }

    fn data_available(&mut self, timeout: Duration) -> Result<usize, Error> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; COM_BUFFER_SIZE];
        loop {
            let stream = self.stream_mut()?;
            match stream.peek(&mut buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(0);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
