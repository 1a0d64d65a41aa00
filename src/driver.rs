//! Link drivers: the trait the stack polls, a TAP device implementation,
//! and an in-memory queue pair for tests and demos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::fd::AsRawFd;
use std::rc::Rc;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tun_tap::{Iface, Mode};

use crate::error::NetError;

/// A raw Ethernet frame transport.
///
/// `recv` must poll: it returns `Ok(0)` when no frame is waiting and never
/// blocks. Frames are complete Ethernet frames without the FCS.
pub trait LinkDriver {
    /// Send one frame.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Receive one frame into `buf`, returning its length, or `Ok(0)` when
    /// nothing is waiting.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Driver over a Linux TAP device.
pub struct TapDriver {
    iface: Iface,
}

impl TapDriver {
    /// Open the TAP device `name` (created if absent) and switch its fd to
    /// non-blocking so `recv` polls.
    pub fn new(name: &str) -> Result<Self, NetError> {
        let iface = Iface::without_packet_info(name, Mode::Tap)?;

        let fd = iface.as_raw_fd();
        let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(errno_err)?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(errno_err)?;

        Ok(TapDriver { iface })
    }

    /// Kernel-assigned device name.
    pub fn name(&self) -> &str {
        self.iface.name()
    }
}

fn errno_err(errno: nix::Error) -> NetError {
    NetError::Io(io::Error::from_raw_os_error(errno as i32))
}

impl LinkDriver for TapDriver {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.iface.send(frame).map(|_| ())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.iface.recv(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct Queues {
    rx: VecDeque<Vec<u8>>,
    tx: VecDeque<Vec<u8>>,
}

/// In-memory driver backed by a pair of frame queues.
///
/// Cloning yields another handle onto the same queues, so a test can hold
/// one handle, hand the other to the stack, then inject inbound frames and
/// inspect what the stack transmitted. Single-threaded by design, like the
/// stack itself.
#[derive(Clone, Default)]
pub struct QueueDriver {
    queues: Rc<RefCell<Queues>>,
}

impl QueueDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for the stack's next `recv`.
    pub fn inject(&self, frame: &[u8]) {
        self.queues.borrow_mut().rx.push_back(frame.to_vec());
    }

    /// Pop the oldest frame the stack transmitted, if any.
    pub fn transmitted(&self) -> Option<Vec<u8>> {
        self.queues.borrow_mut().tx.pop_front()
    }

    /// Number of transmitted frames not yet popped.
    pub fn transmitted_len(&self) -> usize {
        self.queues.borrow().tx.len()
    }
}

impl LinkDriver for QueueDriver {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.queues.borrow_mut().tx.push_back(frame.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.queues.borrow_mut().rx.pop_front() {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }
}
