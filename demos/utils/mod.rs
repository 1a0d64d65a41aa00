use std::io;
use std::process::Command;

/// Give the TAP device an address on the host side and bring it up, so the
/// kernel routes traffic for the stack's subnet into it.
pub fn configure_interface(iface_name: &str, ip_cidr: &str) -> io::Result<()> {
    let status = Command::new("ip")
        .args(["addr", "add", ip_cidr, "dev", iface_name])
        .status()?;
    if !status.success() {
        panic!(
            "Failed to configure IP address {} for {}",
            ip_cidr, iface_name
        );
    }

    let status = Command::new("ip")
        .args(["link", "set", "up", "dev", iface_name])
        .status()?;
    if !status.success() {
        panic!("Failed to bring up interface {}", iface_name);
    }

    println!(
        "Interface {} configured with IP {} and brought up",
        iface_name, ip_cidr
    );
    Ok(())
}
