//! Platform queries for user idle time

#[cfg(any(target_os = "linux", target_os = "macos"))]
use tokio::process::Command;
#[cfg(any(target_os = "linux", target_os = "macos"))]
use tracing::debug;
use tracing::info;

use crate::idle::IdleError;

#[cfg(target_os = "linux")]
const IDLE_HELPER: &str = "xprintidle";
#[cfg(target_os = "macos")]
const IDLE_HELPER: &str = "ioreg";

/// Seconds since the last keyboard or mouse input
pub async fn query_idle_seconds() -> Result<u64, IdleError> {
    #[cfg(target_os = "linux")]
    {
        let stdout = run_helper(&[]).await?;
        parse_xprintidle(&stdout)
    }

    #[cfg(target_os = "macos")]
    {
        let stdout = run_helper(&["-c", "IOHIDSystem"]).await?;
        parse_ioreg_idle(&stdout)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(IdleError::Unsupported)
    }
}

/// Check that the platform idle helper can be executed
pub async fn check_idle_helper_available() -> Result<(), IdleError> {
    let seconds = query_idle_seconds().await?;
    info!("Idle detection available (currently idle {}s)", seconds);
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
async fn run_helper(args: &[&str]) -> Result<String, IdleError> {
    debug!("Querying idle time with {}", IDLE_HELPER);

    let output = Command::new(IDLE_HELPER)
        .args(args)
        .output()
        .await
        .map_err(|source| IdleError::Spawn {
            helper: IDLE_HELPER,
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IdleError::Helper(format!("{} failed: {}", IDLE_HELPER, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `xprintidle` prints idle milliseconds
pub fn parse_xprintidle(stdout: &str) -> Result<u64, IdleError> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<u64>()
        .map(|millis| millis / 1000)
        .map_err(|_| IdleError::Parse(trimmed.to_string()))
}

/// `ioreg -c IOHIDSystem` reports `"HIDIdleTime" = <nanoseconds>`
pub fn parse_ioreg_idle(stdout: &str) -> Result<u64, IdleError> {
    stdout
        .lines()
        .find(|line| line.contains("\"HIDIdleTime\""))
        .and_then(|line| line.rsplit('=').next())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|nanos| nanos / 1_000_000_000)
        .ok_or_else(|| IdleError::Parse("no HIDIdleTime in ioreg output".to_string()))
}
