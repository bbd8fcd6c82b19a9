/*
UDP interface. Each telecommand goes out as one datagram, each received
datagram comes up as one buffer, so framing matches packet boundaries for
free. The socket is connected to the target address so stray traffic from
other endpoints is dropped by the kernel.
*/

use super::{ComInterface, COM_BUFFER_SIZE};
use std::io::{Error, ErrorKind};
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

pub struct UdpComInterface {
    local_addr: String,
    target_addr: String,
    socket: Option<UdpSocket>,
}

impl UdpComInterface {
    /// `local_addr` of "0.0.0.0:0" lets the OS pick the source port
    pub fn new(local_addr: String, target_addr: String) -> UdpComInterface {
        UdpComInterface {
            local_addr,
            target_addr,
            socket: None,
        }
    }

    fn socket_mut(&mut self) -> Result<&mut UdpSocket, Error> {
        self.socket
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "UDP interface is not open"))
    }
}

impl ComInterface for UdpComInterface {
    fn open(&mut self) -> Result<(), Error> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(&self.local_addr)?;
        socket.connect(&self.target_addr)?;
        socket.set_nonblocking(true)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.socket = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let socket = self.socket_mut()?;
        socket.send(data)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let socket = self.socket_mut()?;
        let mut packets = Vec::new();
        let mut buffer = [0u8; COM_BUFFER_SIZE];
        loop {
            match socket.recv(&mut buffer) {
                Ok(n) => packets.push(buffer[..n].to_vec()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(packets)
    }

    fn data_available(&mut self, timeout: Duration) -> Result<usize, Error> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; COM_BUFFER_SIZE];
        loop {
            let socket = self.socket_mut()?;
            match socket.peek(&mut buffer) {
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
