//! Serial port device lookup.

use log::{debug, info};
use serialport::{available_ports, SerialPortType};

//==============================================================================
// Public Interface
//==============================================================================

/// Check whether the serial device at `path` is currently connected.
///
/// When the ports cannot be enumerated on this system the device is assumed
/// to be present; the flasher will report the real problem if it is not.
pub(crate) fn device_present(path: &str) -> bool {
    match enumerate_serial_ports() {
        Some(ports) => {
            debug!("detected serial ports: {:?}", ports);
            check_requested_port(&ports, path)
        }
        None => true,
    }
}

//==============================================================================
// Private stuff
//==============================================================================

/// USB ports are listed as `<name>: (<manufacturer> / <product>)`, so the
/// name either matches exactly or is followed by the `": ("` suffix.
fn check_requested_port(ports: &[String], path: &str) -> bool {
    ports.iter().any(|detected| match detected.strip_prefix(path) {
        Some(rest) => rest.is_empty() || rest.starts_with(": ("),
        None => false,
    })
}

/// Enumerates serial devices on the system, `None` when enumeration is not
/// possible.
fn enumerate_serial_ports() -> Option<Vec<String>> {
    match available_ports() {
        Ok(ports) => Some(
            ports
                .into_iter()
                .map(|p| match p.port_type {
                    // USB ports give us more info about the connected serial
                    // controller
                    SerialPortType::UsbPort(info) => format!(
                        "{}: ({} / {})",
                        p.port_name,
                        info.manufacturer.as_deref().unwrap_or(""),
                        info.product.as_deref().unwrap_or("")
                    ),
                    _ => p.port_name,
                })
                .collect(),
        ),
        Err(ref e) => {
            info!("could not enumerate serial ports: {}", e);
            None
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

#[test]
fn requested_port_matches_by_name() {
    let ports = vec![
        "/dev/ttyS0".to_string(),
        "/dev/tty.usbserial-0001: (Silicon Labs / CP2102 USB to UART)".to_string(),
    ];
    assert!(check_requested_port(&ports, "/dev/tty.usbserial-0001"));
    assert!(check_requested_port(&ports, "/dev/ttyS0"));
    assert!(!check_requested_port(&ports, "/dev/ttyUSB0"));
    assert!(!check_requested_port(&[], "/dev/ttyUSB0"));
}

#[test]
fn requested_port_is_not_a_prefix_of_another_port() {
    let ports = vec![
        "/dev/ttyUSB10: (FTDI / FT232R USB UART)".to_string(),
        "/dev/ttyS10".to_string(),
    ];
    assert!(!check_requested_port(&ports, "/dev/ttyUSB1"));
    assert!(!check_requested_port(&ports, "/dev/ttyS1"));
    assert!(check_requested_port(&ports, "/dev/ttyUSB10"));
    assert!(check_requested_port(&ports, "/dev/ttyS10"));
}
