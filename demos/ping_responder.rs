//! A pingable host on a TAP device.
//!
//! Brings the stack up on tap0 and polls; ARP requests and ICMP echo
//! requests are answered by the stack itself.
//!
//! ```sh
//! sudo RUST_LOG=debug cargo run --example ping_responder
//! ping 10.0.0.1
//! ```
//!
//! Root privileges are required to create and configure the TAP device.

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use tapstack::{MacAddr, NetStack, StackConfig, TapDriver};

mod utils;
use utils::configure_interface;

fn main() -> Result<(), tapstack::NetError> {
    env_logger::init();

    let driver = TapDriver::new("tap0")?;
    println!("TAP device created: {}", driver.name());
    configure_interface(driver.name(), "10.0.0.254/24")?;

    let config = StackConfig::new(
        MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        Ipv4Addr::new(10, 0, 0, 1),
    );
    let mut stack = NetStack::new(driver, config)?;
    println!("Responding to pings on 10.0.0.1 ...");

    loop {
        if !stack.poll()? {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
