//! `devices` subcommand: list attached busylights.

use super::{DevicesOutput, Result, device};

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = device::enumerate_lights();

    if json {
        let output = DevicesOutput {
            count: devices.len(),
            devices,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| busylight_hass_lib::BridgeError::Io(e.into()))?;
        println!("{text}");
        return Ok(());
    }

    if devices.is_empty() {
        println!("No busylights found.");
        return Ok(());
    }

    println!(
        "Found {} busylight{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}  {} ({} LEDs)", i + 1, dev.path, dev.name, dev.led_count);
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
