//! iOS device probe: shells out to `idevice_id`/`idevicename` (a libimobiledevice-
//! like probe per §1). Non-goal: this does not speak the iOS device wire protocol.

use std::process::Stdio;
use std::time::Duration;

use corral_core::device::DeviceKind;
use corral_core::prelude::*;
use tokio::process::Command;
use tokio::time::timeout;

use super::{ProbeError, ProbedDevice};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Enumerates iOS devices (physical and simulators registered with
/// `idevice_id`) visible over USB/network pairing.
pub struct IosProbe;

impl IosProbe {
    pub fn is_available() -> bool {
        which::which("idevice_id").is_ok()
    }

    /// Lists UDIDs via `idevice_id -l`, then resolves a display name for each via
    /// `idevicename -u <udid>`. A pairing/trust failure on the UDID listing is
    /// surfaced as `ProbeError::PairingFailure` so the caller can log a user-facing
    /// instruction and leave the prior snapshot untouched for this tick, per §4.9.
    pub async fn list() -> std::result::Result<Vec<ProbedDevice>, ProbeError> {
        let (stdout, stderr, success) = timeout(PROBE_TIMEOUT, run_idevice_id())
            .await
            .map_err(|_| ProbeError::Other(Error::process_launch("idevice_id timed out")))?
            .map_err(ProbeError::Other)?;

        if looks_like_pairing_failure(&stderr) {
            return Err(ProbeError::PairingFailure(stderr));
        }

        if !success && stdout.trim().is_empty() {
            return Err(ProbeError::Other(Error::process_launch(format!(
                "idevice_id failed: {stderr}"
            ))));
        }

        let udids = parse_udids(&stdout);
        let mut devices = Vec::with_capacity(udids.len());
        for udid in udids {
            let name = resolve_name(&udid).await.unwrap_or_else(|| udid.clone());
            devices.push(ProbedDevice {
                id: udid,
                name,
                kind: DeviceKind::Physical,
            });
        }

        Ok(devices)
    }
}

async fn run_idevice_id() -> Result<(String, String, bool)> {
    let output = Command::new("idevice_id")
        .args(["-l"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::process_launch(format!("failed to run idevice_id: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    Ok((stdout, stderr, output.status.success()))
}

async fn resolve_name(udid: &str) -> Option<String> {
    let output = Command::new("idevicename")
        .args(["-u", udid])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn parse_udids(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.split_whitespace().next().unwrap_or(l).to_string())
        .collect()
}

/// Pairing/trust failures from libimobiledevice tools land on stderr with language
/// like "Could not connect... trusted this computer" or "pair". Matched loosely
/// and case-insensitively since exact wording varies by tool version.
fn looks_like_pairing_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("trust") || lower.contains("pair")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_udid_list() {
        let output = "00008101-000123456789001E\n00008110-000455042605801E\n";
        let udids = parse_udids(output);
        assert_eq!(udids.len(), 2);
        assert_eq!(udids[0], "00008101-000123456789001E");
    }

    #[test]
    fn empty_output_yields_no_udids() {
        assert!(parse_udids("").is_empty());
    }

    #[test]
    fn detects_pairing_failure_language() {
        assert!(looks_like_pairing_failure(
            "ERROR: Device is not trusted. Please trust this computer."
        ));
        assert!(looks_like_pairing_failure("ERROR: could not validate pairing"));
        assert!(!looks_like_pairing_failure(""));
        assert!(!looks_like_pairing_failure("No devices found"));
    }
}
