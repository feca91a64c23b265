//! Android device probe: shells out to `adb devices -l` (an ADB-like probe per §1).
//! Non-goal: this does not speak the ADB wire protocol itself.

use std::process::Stdio;
use std::time::Duration;

use corral_core::device::DeviceKind;
use corral_core::prelude::*;
use tokio::process::Command;
use tokio::time::timeout;

use super::{ProbeError, ProbedDevice};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Enumerates Android devices and emulators visible to `adb`.
pub struct AndroidProbe;

impl AndroidProbe {
    pub fn is_available() -> bool {
        which::which("adb").is_ok()
    }

    pub async fn list() -> std::result::Result<Vec<ProbedDevice>, ProbeError> {
        let output = timeout(PROBE_TIMEOUT, run_adb_devices())
            .await
            .map_err(|_| ProbeError::Other(Error::process_launch("adb devices timed out")))?
            .map_err(ProbeError::Other)?;

        Ok(parse_adb_devices(&output))
    }
}

async fn run_adb_devices() -> Result<String> {
    let output = Command::new("adb")
        .args(["devices", "-l"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::process_launch(format!("failed to run adb devices: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !stderr.is_empty() {
        debug!("adb devices stderr: {stderr}");
    }

    // Be lenient with exit codes: adb sometimes warns (e.g. starting the server)
    // on stderr while still producing usable stdout.
    if !output.status.success() && !stdout.contains("List of devices") {
        return Err(Error::process_launch(format!(
            "adb devices failed with exit code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(stdout)
}

/// Parses `adb devices -l` output. Lines in the `device` state are kept; `offline`
/// and `unauthorized` entries are dropped (they are not usable yet). The serial
/// prefix `emulator-` distinguishes virtual from physical devices; a trailing
/// `model:<name>` token (when present) becomes the display name, otherwise the
/// serial itself is used.
fn parse_adb_devices(output: &str) -> Vec<ProbedDevice> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(serial) = fields.next() else { continue };
        let Some(state) = fields.next() else { continue };
        if state != "device" {
            continue;
        }

        let mut model = None;
        for field in fields {
            if let Some(value) = field.strip_prefix("model:") {
                model = Some(value.replace('_', " "));
            }
        }

        let kind = if serial.starts_with("emulator-") {
            DeviceKind::Emulator
        } else {
            DeviceKind::Physical
        };

        devices.push(ProbedDevice {
            id: serial.to_string(),
            name: model.unwrap_or_else(|| serial.to_string()),
            kind,
        });
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_physical_and_emulator_devices() {
        let output = "List of devices attached\n\
            emulator-5554          device product:sdk_gphone64_arm64 model:sdk_gphone64_arm64 device:emulator64_arm64 transport_id:1\n\
            ABC123XYZ              device usb:1-1 product:raven model:Pixel_6 device:oriole transport_id:2\n";

        let devices = parse_adb_devices(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "emulator-5554");
        assert_eq!(devices[0].kind, DeviceKind::Emulator);
        assert_eq!(devices[1].id, "ABC123XYZ");
        assert_eq!(devices[1].name, "Pixel 6");
        assert_eq!(devices[1].kind, DeviceKind::Physical);
    }

    #[test]
    fn drops_offline_and_unauthorized_entries() {
        let output = "List of devices attached\n\
            DEF456                 unauthorized usb:1-2\n\
            GHI789                 offline\n";
        assert!(parse_adb_devices(output).is_empty());
    }

    #[test]
    fn empty_output_yields_no_devices() {
        assert!(parse_adb_devices("List of devices attached\n").is_empty());
        assert!(parse_adb_devices("").is_empty());
    }

    #[test]
    fn falls_back_to_serial_when_no_model_field() {
        let output = "List of devices attached\nemulator-5556          device\n";
        let devices = parse_adb_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "emulator-5556");
    }
}
