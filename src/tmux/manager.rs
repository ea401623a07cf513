use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;

use super::executor::{execute, CapturedOutput, DEFAULT_CAPTURE_LIMIT};
use super::window::{build_window_list, WindowList, WINDOW_FORMAT};
use crate::error::{Error, Result};

const TMUX_BIN: &str = "tmux";

/// Tmux manager - every tmux invocation goes through here
#[derive(Debug, Clone)]
pub struct TmuxManager {
    program: OsString,
    socket: Option<String>,
    capture_limit: usize,
}

impl TmuxManager {
    pub fn new() -> Self {
        Self {
            program: TMUX_BIN.into(),
            socket: None,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }

    /// Use another tmux binary
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Talk to the server on `tmux -L <socket>` instead of the default one
    pub fn with_socket(mut self, socket: Option<String>) -> Self {
        self.socket = socket;
        self
    }

    /// Largest report accepted from a single tmux call
    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    pub fn capture_limit(&self) -> usize {
        self.capture_limit
    }

    /// Full argument vector for `tmux [-L socket] <args...>`
    fn argv<I, S>(&self, args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv: Vec<OsString> = vec![self.program.clone()];
        if let Some(socket) = &self.socket {
            argv.push("-L".into());
            argv.push(socket.into());
        }
        argv.extend(args.into_iter().map(Into::into));
        argv
    }

    fn tmux_cmd(&self) -> Command {
        let argv = self.argv(std::iter::empty::<OsString>());
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd
    }

    /// Run a pass/fail subcommand, returning its exit code
    async fn status<I, S>(&self, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        execute(&self.argv(args), None).await
    }

    /// Run a report subcommand and return its stdout.
    ///
    /// A non-zero exit is an error; `what` names the report in it.
    async fn report<I, S>(&self, what: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut output = CapturedOutput::with_capacity(self.capture_limit);
        let code = execute(&self.argv(args), Some(&mut output)).await?;
        if code != 0 {
            tracing::warn!("tmux {} exited with {}", what, code);
            return Err(Error::tmux(format!("{} failed (exit code {})", what, code)));
        }
        Ok(output.as_str_lossy().into_owned())
    }

    /// Check if tmux is available
    pub async fn is_available(&self) -> bool {
        matches!(self.status(["-V"]).await, Ok(0))
    }

    /// Start the tmux server if it is not running yet
    pub async fn start_server(&self) -> Result<()> {
        match self.status(["start-server"]).await? {
            0 => Ok(()),
            code => Err(Error::tmux(format!(
                "Failed to start server (exit code {})",
                code
            ))),
        }
    }

    /// Check if a session exists
    pub async fn has_session(&self, name: &str) -> Result<bool> {
        Ok(self.status(["has-session", "-t", name]).await? == 0)
    }

    /// Names of all running sessions, in tmux order
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut output = CapturedOutput::with_capacity(self.capture_limit);
        let code = execute(
            &self.argv(["list-sessions", "-F", "#{session_name}"]),
            Some(&mut output),
        )
        .await?;

        if code != 0 {
            // No server running means no sessions
            return Ok(Vec::new());
        }

        Ok(output
            .as_str_lossy()
            .lines()
            .filter(|line| !line.is_empty())
            .map(|s| s.to_string())
            .collect())
    }

    /// Name of the session the calling client is attached to
    pub async fn current_session(&self) -> Result<String> {
        let out = self
            .report(
                "display-message",
                ["display-message", "-p", "#{session_name}"],
            )
            .await?;
        let name = out.trim();
        if name.is_empty() {
            return Err(Error::tmux("Not attached to a tmux session"));
        }
        Ok(name.to_string())
    }

    /// Capture the window layout of `session`, in tmux's own order
    pub async fn capture_windows(&self, session: &str) -> Result<WindowList> {
        let report = self
            .report(
                "list-windows",
                ["list-windows", "-F", WINDOW_FORMAT, "-t", session],
            )
            .await?;
        let windows = build_window_list(&report)?.invert();
        tracing::debug!("captured {} windows from {}", windows.len(), session);
        Ok(windows)
    }

    /// Execute a session script inside the tmux server
    pub async fn source_script(&self, path: &Path) -> Result<()> {
        let mut args: Vec<OsString> = vec!["source-file".into()];
        args.push(path.as_os_str().to_owned());
        match self.status(args).await? {
            0 => Ok(()),
            code => Err(Error::tmux(format!(
                "Failed to source {} (exit code {})",
                path.display(),
                code
            ))),
        }
    }

    /// Attach to a session (blocking, inherits the terminal)
    pub async fn attach(&self, name: &str) -> Result<()> {
        let status = self
            .tmux_cmd()
            .args(["attach-session", "-t", name])
            .status()
            .await
            .map_err(|e| Error::spawn(self.program.to_string_lossy(), e))?;

        if !status.success() {
            return Err(Error::tmux(format!("Failed to attach to session {}", name)));
        }

        Ok(())
    }

    /// Switch the current tmux client to a target session
    pub async fn switch_client(&self, name: &str) -> Result<()> {
        match self.status(["switch-client", "-t", name]).await? {
            0 => Ok(()),
            code => Err(Error::tmux(format!(
                "Failed to switch client to {} (exit code {})",
                name, code
            ))),
        }
    }
}

impl Default for TmuxManager {
    fn default() -> Self {
        Self::new()
    }
}
