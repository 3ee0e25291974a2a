use crate::dotnet::DotnetError;

/// Abstraction over dotnet CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait DotnetExecutor: Send + Sync {
    /// Execute a dotnet command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, DotnetError>;

    /// Execute a dotnet command, streaming output to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), DotnetError>;
}

/// Real dotnet CLI executor.
pub struct RealExecutor;

impl DotnetExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, DotnetError> {
        use std::process::Stdio;

        tracing::debug!(?args, "dotnet");
        let output = tokio::process::Command::new("dotnet")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DotnetError::NotFound { source: e })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| DotnetError::InvalidUtf8 { source: e })
        } else {
            // msbuild reports most failures on stdout
            let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if stderr.trim().is_empty() {
                stderr = String::from_utf8_lossy(&output.stdout).to_string();
            }
            Err(DotnetError::CommandFailed {
                args: args.to_vec(),
                stderr,
            })
        }
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), DotnetError> {
        use std::process::Stdio;

        tracing::debug!(?args, "dotnet (streaming)");
        let status = tokio::process::Command::new("dotnet")
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| DotnetError::NotFound { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(DotnetError::CommandFailed {
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }
}
