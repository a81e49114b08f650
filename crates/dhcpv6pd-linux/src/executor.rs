// # ip Batch Executor
//
// Applies address batches by piping them into `ip -force -batch -`.
// `-force` keeps iproute2 going after a failed line, so one stale address
// does not prevent the rest of the batch from being applied; the exit
// status still reports the failure.

use async_trait::async_trait;
use dhcpv6pd_core::traits::{AddressOp, BatchExecutor};
use dhcpv6pd_core::{Error, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default iproute2 binary, resolved through `PATH`
pub const DEFAULT_IP_BINARY: &str = "ip";

/// Batch executor backed by iproute2
#[derive(Debug, Clone)]
pub struct IpBatchExecutor {
    binary: String,
}

impl IpBatchExecutor {
    /// Create an executor running `binary` (e.g. `ip` or `/sbin/ip`)
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for IpBatchExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_IP_BINARY)
    }
}

/// Render a batch as `ip -batch` input, one operation per line
pub fn render_batch(batch: &[AddressOp]) -> String {
    let mut input = String::new();
    for op in batch {
        input.push_str(&op.to_string());
        input.push('\n');
    }
    input
}

#[async_trait]
impl BatchExecutor for IpBatchExecutor {
    async fn execute(&self, batch: &[AddressOp]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let input = render_batch(batch);
        debug!("{} -force -batch -:\n{}", self.binary, input);

        // Dropping the future (batch timeout) kills the child
        let mut child = Command::new(&self.binary)
            .args(["-force", "-batch", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::executor(format!("failed to run {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await.map_err(|e| {
                Error::executor(format!("failed to write batch to {}: {}", self.binary, e))
            })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::executor(format!("failed to wait for {}: {}", self.binary, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(Error::executor(format!("{} exited with {}", self.binary, output.status)))
        } else {
            Err(Error::executor(stderr.to_string()))
        }
    }

    fn executor_name(&self) -> &'static str {
        "ip-batch"
    }
}
