//! Cross-platform subprocess execution
//!
//! Every external command workstack runs (git, gt, gh, post-create hooks)
//! goes through this module so that logging, tracing, concurrency limiting,
//! and dry-run handling stay consistent.
//!
//! - Unix: shell commands use `sh -c` (resolved via PATH)
//! - Windows: shell commands use Git Bash (requires Git for Windows)

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::sync::Semaphore;

/// Semaphore to limit concurrent command execution.
/// Prevents resource exhaustion when spawning many parallel git commands.
static CMD_SEMAPHORE: OnceLock<Semaphore> = OnceLock::new();

/// Default concurrent external commands. Tuned to avoid hitting OS limits
/// (file descriptors, process limits) while maintaining good parallelism.
const DEFAULT_CONCURRENT_COMMANDS: usize = 32;

fn max_concurrent_commands() -> usize {
    std::env::var("WORKSTACK_MAX_CONCURRENT_COMMANDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CONCURRENT_COMMANDS)
}

fn get_semaphore() -> &'static Semaphore {
    CMD_SEMAPHORE.get_or_init(|| Semaphore::new(max_concurrent_commands()))
}

/// Monotonic epoch for trace timestamps.
///
/// Using `Instant` instead of `SystemTime` ensures monotonic timestamps even
/// if the system clock steps backward.
static TRACE_EPOCH: OnceLock<Instant> = OnceLock::new();

fn trace_epoch() -> &'static Instant {
    TRACE_EPOCH.get_or_init(Instant::now)
}

// ============================================================================
// Dry-run mode
// ============================================================================

/// Process-wide dry-run flag, set once from the CLI.
///
/// Classification of destructive vs. read-only operations lives in the
/// operation facades (git, graphite); they consult this flag before invoking
/// anything destructive. Reads always execute.
static DRY_RUN: AtomicBool = AtomicBool::new(false);

/// Enable or disable dry-run mode for this process.
pub fn set_dry_run(enabled: bool) {
    DRY_RUN.store(enabled, Ordering::Relaxed);
}

/// Whether dry-run mode is active.
pub fn is_dry_run() -> bool {
    DRY_RUN.load(Ordering::Relaxed)
}

/// Print the dry-run notice for a destructive command that was skipped.
pub fn announce_dry_run(argv: &[&str]) {
    println!("[DRY RUN] Would run: {}", argv.join(" "));
}

// ============================================================================
// Shell configuration
// ============================================================================

/// Cached shell configuration for the current platform
static SHELL_CONFIG: OnceLock<ShellConfig> = OnceLock::new();

/// Shell configuration for command execution
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Path to the shell executable
    pub executable: PathBuf,
    /// Arguments to pass before the command (e.g., ["-c"] for sh)
    pub args: Vec<String>,
    /// Human-readable name for error messages
    pub name: String,
}

impl ShellConfig {
    /// Get the shell configuration for the current platform.
    ///
    /// On Unix, returns sh. On Windows, returns Git Bash (error paths surface
    /// when the command is actually spawned).
    pub fn get() -> &'static ShellConfig {
        SHELL_CONFIG.get_or_init(detect_shell)
    }

    /// Create a Command configured for shell execution.
    ///
    /// The command string will be passed to the shell for interpretation.
    pub fn command(&self, shell_command: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        for arg in &self.args {
            cmd.arg(arg);
        }
        cmd.arg(shell_command);
        cmd
    }
}

fn detect_shell() -> ShellConfig {
    #[cfg(unix)]
    {
        ShellConfig {
            executable: PathBuf::from("sh"),
            args: vec!["-c".to_string()],
            name: "sh".to_string(),
        }
    }

    #[cfg(windows)]
    {
        detect_windows_shell()
    }
}

/// Detect Git Bash on Windows.
///
/// Finds `git.exe` in PATH and derives the bash.exe location from the Git
/// installation. We avoid `which bash` because on systems with WSL,
/// `C:\Windows\System32\bash.exe` (the WSL launcher) often comes before Git
/// Bash in PATH.
#[cfg(windows)]
fn detect_windows_shell() -> ShellConfig {
    let executable = find_git_bash().unwrap_or_else(|| PathBuf::from("bash.exe"));
    ShellConfig {
        executable,
        args: vec!["-c".to_string()],
        name: "Git Bash".to_string(),
    }
}

#[cfg(windows)]
fn find_git_bash() -> Option<PathBuf> {
    if let Ok(git_path) = which::which("git") {
        // git.exe is typically at Git/cmd/git.exe or Git/bin/git.exe
        // bash.exe is at Git/bin/bash.exe or Git/usr/bin/bash.exe
        if let Some(git_dir) = git_path.parent().and_then(|p| p.parent()) {
            let bash_path = git_dir.join("bin").join("bash.exe");
            if bash_path.exists() {
                return Some(bash_path);
            }
            let bash_path = git_dir.join("usr").join("bin").join("bash.exe");
            if bash_path.exists() {
                return Some(bash_path);
            }
        }
    }

    let bash_path = PathBuf::from(r"C:\Program Files\Git\bin\bash.exe");
    if bash_path.exists() {
        return Some(bash_path);
    }

    None
}

// ============================================================================
// Timeout-based execution
// ============================================================================

/// Spawns the process, captures stdout/stderr in background threads, and
/// waits with a deadline. If the timeout is exceeded, kills the process and
/// returns a TimedOut error.
fn run_with_timeout_impl(
    cmd: &mut Command,
    timeout: std::time::Duration,
) -> std::io::Result<std::process::Output> {
    use std::io::{ErrorKind, Read};
    use std::process::Stdio;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    // Read stdout/stderr on separate threads so full pipe buffers can't
    // deadlock the child.
    let stdout_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut handle) = stdout_handle {
            let _ = handle.read_to_end(&mut buf);
        }
        buf
    });

    let stderr_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut handle) = stderr_handle {
            let _ = handle.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait(); // Reap the process

                    // Reader threads see EOF after the kill
                    let _ = stdout_thread.join();
                    let _ = stderr_thread.join();

                    return Err(std::io::Error::new(ErrorKind::TimedOut, "command timed out"));
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

// ============================================================================
// Builder-style command execution
// ============================================================================

/// Builder for executing commands with logging, tracing, and optional stdin.
///
/// # Examples
///
/// ```ignore
/// let output = Cmd::new("git")
///     .args(["status", "--porcelain"])
///     .current_dir(&repo_path)
///     .context("my-worktree")
///     .run()?;
/// ```
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    stdin_data: Option<Vec<u8>>,
    timeout: Option<std::time::Duration>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            context: None,
            stdin_data: None,
            timeout: None,
            envs: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the logging context (typically the worktree name for git commands).
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Set data to write to the command's stdin.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    /// Set a timeout for command execution.
    pub fn timeout(mut self, duration: std::time::Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    /// Execute the command and return its output.
    pub fn run(self) -> std::io::Result<std::process::Output> {
        use std::io::Write;
        use std::process::Stdio;

        let cmd_str = if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        };

        match &self.context {
            Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
            None => log::debug!("$ {}", cmd_str),
        }

        // Limit concurrent subprocesses (status collectors fan out)
        let _guard = get_semaphore().acquire();

        let t0 = Instant::now();
        let ts = t0.duration_since(*trace_epoch()).as_micros() as u64;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }

        let result = if let Some(stdin_data) = self.stdin_data {
            // Stdin piping requires spawn/write/wait.
            // Note: the stdin path doesn't support timeout.
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            match cmd.spawn() {
                Ok(mut child) => {
                    // Ignore BrokenPipe - some commands exit before reading stdin
                    if let Some(mut stdin) = child.stdin.take()
                        && let Err(e) = stdin.write_all(&stdin_data)
                        && e.kind() != std::io::ErrorKind::BrokenPipe
                    {
                        return Err(e);
                    }
                    child.wait_with_output()
                }
                Err(e) => Err(e),
            }
        } else if let Some(timeout_duration) = self.timeout {
            run_with_timeout_impl(&mut cmd, timeout_duration)
        } else {
            cmd.output()
        };

        let dur_us = t0.elapsed().as_micros() as u64;
        match (&result, &self.context) {
            (Ok(output), Some(ctx)) => {
                log::debug!(
                    "[ws-trace] ts={} context={} cmd=\"{}\" dur_us={} ok={}",
                    ts,
                    ctx,
                    cmd_str,
                    dur_us,
                    output.status.success()
                );
            }
            (Ok(output), None) => {
                log::debug!(
                    "[ws-trace] ts={} cmd=\"{}\" dur_us={} ok={}",
                    ts,
                    cmd_str,
                    dur_us,
                    output.status.success()
                );
            }
            (Err(e), _) => {
                log::debug!("[ws-trace] ts={} cmd=\"{}\" dur_us={} err=\"{}\"", ts, cmd_str, dur_us, e);
            }
        }

        result
    }
}

// ============================================================================
// Streaming command execution
// ============================================================================

/// Execute a shell command with output streamed to the parent's terminal.
///
/// Used for post-create commands and `gt sync`, where the user should see
/// progress as it happens. stdout/stderr are inherited so interactive tools
/// detect a TTY and don't buffer.
///
/// Returns an error carrying the exit code if the command exits non-zero.
/// When the child is killed by a signal on Unix, the conventional
/// 128 + signal code is reported (130 for SIGINT).
pub fn execute_streaming(command: &str, working_dir: &std::path::Path) -> anyhow::Result<()> {
    use crate::git::GitError;

    let shell = ShellConfig::get();
    log::debug!("$ {} [{}]", command, working_dir.display());

    let status = shell
        .command(command)
        .current_dir(working_dir)
        .stdin(std::process::Stdio::null())
        .status()
        .map_err(|e| {
            GitError::CommandFailed(format!("Failed to execute command with {}: {}", shell.name, e))
        })?;

    #[cfg(unix)]
    if let Some(sig) = std::os::unix::process::ExitStatusExt::signal(&status) {
        return Err(GitError::ChildProcessExited {
            code: 128 + sig,
            message: format!("terminated by signal {}", sig),
        }
        .into());
    }

    if !status.success() {
        let code = status.code().unwrap_or(1);
        return Err(GitError::ChildProcessExited {
            code,
            message: format!("exit status: {}", code),
        }
        .into());
    }

    Ok(())
}
