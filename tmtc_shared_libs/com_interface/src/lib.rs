/*
Communication interfaces between the ground commander and the spacecraft
link.

Everything the dispatch core needs from a link sits behind the ComInterface
trait. Concrete transports live in their own modules and are selected at
runtime through the ComType enum. Implementations that use background I/O
are responsible for their own thread safety, the dispatch core calls send
and receive from a single tick loop without additional locking.
*/

use std::fmt;
use std::io::Error;
use std::str::FromStr;
use std::time::Duration;
use strum::EnumIter;

pub mod dummy;
pub mod serial;
pub mod tcp;
pub mod udp;

pub use dummy::DummyComInterface;
pub use serial::SerialComInterface;
pub use tcp::TcpComInterface;
pub use udp::UdpComInterface;

pub const COM_BUFFER_SIZE: usize = 4096;

/// Interface trait implemented by all spacecraft link transports
pub trait ComInterface {
    /// Open the underlying channel. Opening an interface that is already
    /// open is a no-op.
    fn open(&mut self) -> Result<(), Error>;
    /// Close the underlying channel and drop any buffered data
    fn close(&mut self) -> Result<(), Error>;
    fn is_open(&self) -> bool;
    /// Send one packed telecommand
    fn send(&mut self, data: &[u8]) -> Result<(), Error>;
    /// Drain everything received since the last call, one buffer per packet
    /// or read chunk depending on the transport framing
    fn receive(&mut self) -> Result<Vec<Vec<u8>>, Error>;
    /// Wait up to `timeout` for data and report how much is pending.
    /// A zero timeout polls once without blocking.
    fn data_available(&mut self, timeout: Duration) -> Result<usize, Error>;
}

/// Which link transport the commander talks through
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComType {
    Tcp,
    Udp,
    Serial,
    Dummy,
}

impl fmt::Display for ComType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ComType::Tcp => write!(f, "tcp"),
            ComType::Udp => write!(f, "udp"),
            ComType::Serial => write!(f, "serial"),
            ComType::Dummy => write!(f, "dummy"),
        }
    }
}

impl FromStr for ComType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(ComType::Tcp),
            "udp" => Ok(ComType::Udp),
            "serial" => Ok(ComType::Serial),
            "dummy" => Ok(ComType::Dummy),
            _ => Err(()),
        }
    }
}
