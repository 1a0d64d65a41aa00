//! UDP echo server on a TAP device.
//!
//! Binds the echo port, then mirrors every datagram back to its sender.
//!
//! ```sh
//! sudo RUST_LOG=debug cargo run --example udp_echo
//! echo hello | nc -u 10.0.0.1 7
//! ```

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use tapstack::{MacAddr, NetStack, StackConfig, TapDriver};

mod utils;
use utils::configure_interface;

const ECHO_PORT: u16 = 7;

fn main() -> Result<(), tapstack::NetError> {
    env_logger::init();

    let driver = TapDriver::new("tap0")?;
    configure_interface(driver.name(), "10.0.0.254/24")?;

    let config = StackConfig::new(
        MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        Ipv4Addr::new(10, 0, 0, 1),
    );
    let mut stack = NetStack::new(driver, config)?;

    // The handler runs inside poll(), so it queues the datagrams and the
    // main loop sends the echoes afterwards.
    let received: Rc<RefCell<Vec<(Vec<u8>, Ipv4Addr, u16)>>> = Rc::new(RefCell::new(Vec::new()));
    let queue = Rc::clone(&received);
    stack.udp_open(ECHO_PORT, move |payload, src_ip, src_port| {
        println!(
            "echo: {} bytes from {}:{}",
            payload.len(),
            src_ip,
            src_port
        );
        queue.borrow_mut().push((payload.to_vec(), src_ip, src_port));
    })?;
    println!("Echoing UDP on 10.0.0.1:{ECHO_PORT} ...");

    loop {
        if !stack.poll()? {
            thread::sleep(Duration::from_millis(1));
        }
        for (payload, src_ip, src_port) in received.borrow_mut().drain(..) {
            stack.udp_send(&payload, ECHO_PORT, src_ip, src_port)?;
        }
    }
}
