use crate::pin::Pin;
use std::process::Command;
use tracing::{error, info};

/// Installs exact pins. Failure is reported, never raised: the engine
/// treats a failed install as "no change".
pub trait Installer {
    fn install(&self, pin: &Pin) -> bool;
}

/// `pip install --no-deps name==version`. Transitive dependencies are
/// deliberately untouched; the iteration engine repairs them itself.
pub struct PipInstaller {
    pip: String,
}

impl PipInstaller {
    pub fn from_env() -> Self {
        Self {
            pip: std::env::var("PINFIX_PIP").unwrap_or_else(|_| "pip3".to_string()),
        }
    }
}

impl Installer for PipInstaller {
    fn install(&self, pin: &Pin) -> bool {
        let output = Command::new(&self.pip)
            .args(["install", "--no-deps", &pin.to_string()])
            .output();
        match output {
            Ok(output) if output.status.success() => {
                info!("installed {pin}");
                true
            }
            Ok(output) => {
                error!(
                    "installation failed for {pin}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                error!("failed to run {}: {e}", self.pip);
                false
            }
        }
    }
}
