// file: src/exec/mod.rs
// version: 1.3.0
// guid: e1f62c84-97ab-4d05-b3e9-26c50a18d472

//! Command construction and execution.
//!
//! Commands are built as explicit argument lists (never interpolated shell
//! strings) and executed through the [`CommandRunner`] trait so command
//! handlers can be exercised in tests without touching the host. Fixed
//! vendor pipelines that genuinely need a shell go through [`Cmd::shell`]
//! with constant strings only.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::ui;
use crate::{DvmError, Result};

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    sudo: bool,
    cwd: Option<PathBuf>,
    stdin: Option<String>,
    env: HashMap<String, String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sudo: false,
            cwd: None,
            stdin: None,
            env: HashMap::new(),
        }
    }

    /// A fixed `bash -c` pipeline. Only ever called with constant strings;
    /// user input must go through [`Cmd::arg`] instead.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run via sudo unless the process is already root.
    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Feed the given string to the child's stdin (e.g. `crontab -`).
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn wants_sudo(&self) -> bool {
        self.sudo
    }

    fn effective_parts(&self) -> (String, Vec<String>) {
        if self.sudo && !is_root() {
            let mut args = vec![self.program.clone()];
            args.extend(self.args.iter().cloned());
            ("sudo".to_string(), args)
        } else {
            (self.program.clone(), self.args.clone())
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Executes commands either against the host or, in tests, against a script.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output.
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput>;

    /// Run a command with inherited stdio (interactive tools, apt progress).
    async fn run_interactive(&self, cmd: &Cmd) -> Result<i32>;
}

/// Runner backed by `tokio::process` against the local host.
pub struct SystemRunner;

impl SystemRunner {
    fn build(&self, cmd: &Cmd) -> tokio::process::Command {
        let (program, args) = cmd.effective_parts();
        let mut command = tokio::process::Command::new(program);
        command.args(args);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &cmd.env {
            command.env(key, value);
        }
        command
    }
}

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput> {
        debug!("running: {}", cmd);
        let mut command = self.build(cmd);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        command.stdin(if cmd.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command
            .spawn()
            .map_err(|e| DvmError::execution(format!("failed to spawn {}: {}", cmd.program(), e)))?;

        if let Some(data) = &cmd.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data.as_bytes()).await?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DvmError::execution(format!("failed to wait for {}: {}", cmd.program(), e)))?;

        Ok(CmdOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn run_interactive(&self, cmd: &Cmd) -> Result<i32> {
        debug!("running (interactive): {}", cmd);
        let mut command = self.build(cmd);
        if let Some(data) = &cmd.stdin {
            command.stdin(Stdio::piped());
            let mut child = command.spawn().map_err(|e| {
                DvmError::execution(format!("failed to spawn {}: {}", cmd.program(), e))
            })?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data.as_bytes()).await?;
                drop(stdin);
            }
            let status = child.wait().await.map_err(|e| {
                DvmError::execution(format!("failed to wait for {}: {}", cmd.program(), e))
            })?;
            return Ok(status.code().unwrap_or(-1));
        }

        let status = command
            .status()
            .await
            .map_err(|e| DvmError::execution(format!("failed to spawn {}: {}", cmd.program(), e)))?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::getuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Run a required step: print the description, run with inherited stdio and
/// fail on non-zero exit.
pub async fn step(runner: &dyn CommandRunner, cmd: Cmd, desc: &str) -> Result<()> {
    ui::status(desc);
    let status = runner.run_interactive(&cmd).await?;
    if status != 0 {
        ui::failure(&format!("{} failed", desc));
        return Err(DvmError::execution(format!(
            "{} exited with status {}",
            cmd.program(),
            status
        )));
    }
    ui::success(&format!("{} done", desc));
    Ok(())
}

/// Run an optional step: report failure but keep going.
pub async fn try_step(runner: &dyn CommandRunner, cmd: Cmd, desc: &str) -> Result<bool> {
    ui::status(desc);
    let status = runner.run_interactive(&cmd).await?;
    if status != 0 {
        ui::warn(&format!("{} failed (continuing)", desc));
        return Ok(false);
    }
    ui::success(&format!("{} done", desc));
    Ok(true)
}

/// Run a command and capture stdout, failing on non-zero exit.
pub async fn capture(runner: &dyn CommandRunner, cmd: Cmd) -> Result<String> {
    let output = runner.run(&cmd).await?;
    if !output.success() {
        return Err(DvmError::execution(format!(
            "{} exited with status {}: {}",
            cmd.program(),
            output.status,
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
pub mod testing {
    //! Scripted runner for command handler tests.

    use super::*;
    use std::sync::Mutex;

    /// Records every command and answers from a list of (pattern, output)
    /// rules. Unmatched commands succeed with empty output.
    #[derive(Default)]
    pub struct ScriptRunner {
        calls: Mutex<Vec<String>>,
        rules: Mutex<Vec<(String, CmdOutput)>>,
    }

    impl ScriptRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond with `output` to any command whose rendering contains
        /// `pattern`. First matching rule wins.
        pub fn respond(&self, pattern: &str, output: CmdOutput) {
            self.rules
                .lock()
                .unwrap()
                .push((pattern.to_string(), output));
        }

        pub fn fail_on(&self, pattern: &str) {
            self.respond(pattern, CmdOutput::failed(1, "scripted failure"));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn ran(&self, pattern: &str) -> bool {
            self.calls().iter().any(|c| c.contains(pattern))
        }

        /// Index of the first recorded call containing `pattern`.
        pub fn position(&self, pattern: &str) -> Option<usize> {
            self.calls().iter().position(|c| c.contains(pattern))
        }

        fn answer(&self, cmd: &Cmd) -> CmdOutput {
            let rendered = cmd.to_string();
            self.calls.lock().unwrap().push(rendered.clone());
            for (pattern, output) in self.rules.lock().unwrap().iter() {
                if rendered.contains(pattern.as_str()) {
                    return output.clone();
                }
            }
            CmdOutput::ok("")
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for ScriptRunner {
        async fn run(&self, cmd: &Cmd) -> Result<CmdOutput> {
            Ok(self.answer(cmd))
        }

        async fn run_interactive(&self, cmd: &Cmd) -> Result<i32> {
            Ok(self.answer(cmd).status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_rendering() {
        let cmd = Cmd::new("mkfs.ext4").arg("-F").arg("/dev/sdb");
        assert_eq!(cmd.to_string(), "mkfs.ext4 -F /dev/sdb");
    }

    #[test]
    fn test_sudo_prefix_parts() {
        let cmd = Cmd::new("mount").arg("-a").sudo();
        let (program, args) = cmd.effective_parts();
        if is_root() {
            assert_eq!(program, "mount");
        } else {
            assert_eq!(program, "sudo");
            assert_eq!(args, vec!["mount".to_string(), "-a".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner;
        let output = runner.run(&Cmd::new("echo").arg("hello")).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_system_runner_stdin() {
        let runner = SystemRunner;
        let output = runner
            .run(&Cmd::new("cat").stdin("piped input"))
            .await
            .unwrap();
        assert_eq!(output.stdout, "piped input");
    }

    #[tokio::test]
    async fn test_capture_fails_on_nonzero() {
        let runner = SystemRunner;
        let result = capture(&runner, Cmd::new("false")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_script_runner_rules() {
        use testing::ScriptRunner;

        let runner = ScriptRunner::new();
        runner.fail_on("rsync");
        runner.respond("growpart", CmdOutput::failed(1, "NOCHANGE: partition is full"));

        let ok = runner.run(&Cmd::new("systemctl").arg("stop").arg("docker")).await.unwrap();
        assert!(ok.success());

        let failed = runner.run(&Cmd::new("rsync").arg("-aHX")).await.unwrap();
        assert!(!failed.success());

        assert!(runner.ran("systemctl stop docker"));
        assert!(runner.position("rsync") > runner.position("systemctl stop docker"));
    }
}
