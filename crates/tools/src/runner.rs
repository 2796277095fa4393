//! Subprocess runner — bounded-time execution of external EDA programs.
//!
//! Every tool that shells out (linter, simulator, synthesis container,
//! formal checker) goes through this one entry point so timeout, output
//! capture, and cancellation behave identically everywhere.
//!
//! Two timeouts apply in sequence: a soft timeout sends a polite
//! termination signal first, and a hard timeout (or an external
//! cancellation token) force-kills the process tree. stdout and stderr
//! are captured into independent bounded ring buffers so one noisy
//! stream cannot crowd out the other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use eda_domain::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default cap on captured stdout/stderr before truncation kicks in.
pub const DEFAULT_RING_BYTES: usize = 2 * 1024 * 1024;

/// Environment variables a tool invocation is never allowed to set,
/// because doing so could hijack the dynamic linker or shell startup
/// of the spawned EDA binary.
pub const DENIED_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "BASH_ENV",
    "ENV",
];

/// One invocation request for the subprocess runner.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub soft_timeout: Duration,
    pub hard_timeout: Duration,
    pub stdin: Option<Vec<u8>>,
    /// When set, every stdout line is forwarded here as it arrives, in
    /// addition to being accumulated in the returned ring buffer. Used by
    /// long-running invocations (synthesis jobs) that need to observe
    /// progress before the process exits; quick tool calls leave this
    /// `None`.
    pub stdout_sink: Option<tokio::sync::mpsc::UnboundedSender<String>>,
}

impl RunRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: HashMap::new(),
            soft_timeout: Duration::from_secs(120),
            hard_timeout: Duration::from_secs(300),
            stdin: None,
            stdout_sink: None,
        }
    }

    /// Forward each stdout line to `sink` as it is produced, for callers
    /// that need to observe progress while the process is still running.
    pub fn with_stdout_sink(mut self, sink: tokio::sync::mpsc::UnboundedSender<String>) -> Self {
        self.stdout_sink = Some(sink);
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn timeouts(mut self, soft: Duration, hard: Duration) -> Self {
        self.soft_timeout = soft;
        self.hard_timeout = hard;
        self
    }
}

/// Outcome of a bounded subprocess run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub soft_timeout_fired: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A bounded, line-accumulating output buffer. Once `cap` bytes have been
/// seen, further pushes are dropped and a truncation marker is recorded
/// so callers never mistake a truncated capture for the complete output.
struct RingBuffer {
    buf: String,
    cap: usize,
    truncated: bool,
}

impl RingBuffer {
    fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
            truncated: false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.buf.len() + line.len() + 1 > self.cap {
            self.buf.push_str("\n[... output truncated at capture limit ...]");
            self.truncated = true;
            return;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    fn into_string(self) -> String {
        self.buf
    }
}

/// Run `req` to completion, or until a timeout/cancellation fires.
///
/// A nonzero exit code with no other signal is returned as a normal
/// [`RunResult`], not an [`Error`] — only executable-missing, hard
/// timeout, and cancellation are reported as errors.
pub async fn run(
    req: RunRequest,
    ring_cap: usize,
    cancel: CancellationToken,
) -> Result<RunResult> {
    let mut cmd = Command::new(&req.program);
    cmd.args(&req.args);
    cmd.stdin(if req.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(ref dir) = req.workdir {
        cmd.current_dir(dir);
    }
    cmd.env_clear();
    cmd.env("PATH", std::env::var("PATH").unwrap_or_default());
    for (k, v) in &req.env {
        if DENIED_ENV_VARS.contains(&k.to_ascii_uppercase().as_str()) {
            return Err(Error::BadArgs {
                tool: req.program.clone(),
                message: format!("environment variable '{k}' may not be overridden"),
            });
        }
        cmd.env(k, v);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ToolMissing(req.program.clone())
        } else {
            Error::Io(e)
        }
    })?;

    if let Some(data) = req.stdin {
        use tokio::io::AsyncWriteExt;
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&data).await;
        }
    }

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let stdout_task = tokio::spawn(drain(stdout, ring_cap, req.stdout_sink.clone()));
    let stderr_task = tokio::spawn(drain(stderr, ring_cap, None));

    let soft_timeout_fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let outcome = tokio::select! {
        status = wait_with_soft_timeout(&mut child, req.soft_timeout, soft_timeout_fired.clone()) => status,
        _ = tokio::time::sleep(req.hard_timeout) => {
            kill_tree(&mut child).await;
            Err(Error::Timeout(format!("{} exceeded hard timeout of {:?}", req.program, req.hard_timeout)))
        }
        _ = cancel.cancelled() => {
            kill_tree(&mut child).await;
            Err(Error::Cancelled)
        }
    };

    let stdout_buf = stdout_task.await.unwrap_or_else(|_| RingBuffer::new(ring_cap));
    let stderr_buf = stderr_task.await.unwrap_or_else(|_| RingBuffer::new(ring_cap));

    let exit_code = outcome?;

    Ok(RunResult {
        exit_code,
        stdout: stdout_buf.into_string(),
        stderr: stderr_buf.into_string(),
        elapsed: started.elapsed(),
        soft_timeout_fired: soft_timeout_fired.load(std::sync::atomic::Ordering::Relaxed),
    })
}

/// Wait for the child, sending a polite terminate once `soft_timeout`
/// elapses, and continuing to wait for the hard timeout/cancellation
/// to race against it from the caller.
async fn wait_with_soft_timeout(
    child: &mut tokio::process::Child,
    soft_timeout: Duration,
    fired: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> Result<Option<i32>> {
    tokio::select! {
        status = child.wait() => {
            status.map(|s| s.code()).map_err(Error::Io)
        }
        _ = tokio::time::sleep(soft_timeout) => {
            fired.store(true, std::sync::atomic::Ordering::Relaxed);
            terminate(child).await;
            child.wait().await.map(|s| s.code()).map_err(Error::Io)
        }
    }
}

#[cfg(unix)]
async fn terminate(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc_kill(pid as i32, 15 /* SIGTERM */);
        }
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
}

#[cfg(unix)]
unsafe fn libc_kill(pid: i32, sig: i32) {
    extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    kill(pid, sig);
}

async fn kill_tree(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    cap: usize,
    sink: Option<tokio::sync::mpsc::UnboundedSender<String>>,
) -> RingBuffer {
    let mut buf = RingBuffer::new(cap);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(tx) = &sink {
            let _ = tx.send(line.clone());
        }
        buf.push_line(&line);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_is_tool_missing() {
        let req = RunRequest::new("eda-agent-definitely-not-a-real-binary");
        let err = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolMissing(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let req = RunRequest::new("sh").arg("-c").arg("exit 7");
        let result = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(7));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn captures_stdout() {
        let req = RunRequest::new("sh").arg("-c").arg("echo hello");
        let result = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn hard_timeout_kills_and_errors() {
        let req =
            RunRequest::new("sh").arg("-c").arg("sleep 5").timeouts(
                Duration::from_millis(50),
                Duration::from_millis(100),
            );
        let err = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_token_stops_process() {
        let token = CancellationToken::new();
        let req = RunRequest::new("sh")
            .arg("-c")
            .arg("sleep 5")
            .timeouts(Duration::from_secs(10), Duration::from_secs(10));
        let child_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            child_token.cancel();
        });
        let err = run(req, DEFAULT_RING_BYTES, token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn denied_env_var_is_bad_args() {
        let mut env = HashMap::new();
        env.insert("LD_PRELOAD".to_string(), "evil.so".to_string());
        let req = RunRequest::new("sh").arg("-c").arg("true");
        let req = RunRequest { env, ..req };
        let err = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadArgs { .. }));
    }

    #[tokio::test]
    async fn stdout_sink_receives_lines_incrementally() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let req = RunRequest::new("sh")
            .arg("-c")
            .arg("echo one; echo two")
            .with_stdout_sink(tx);
        let result = run(req, DEFAULT_RING_BYTES, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success());
        let mut seen = Vec::new();
        while let Ok(line) = rx.try_recv() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn ring_buffer_truncates() {
        let mut rb = RingBuffer::new(10);
        rb.push_line("01234567");
        rb.push_line("more data that will not fit");
        let s = rb.into_string();
        assert!(s.contains("truncated"));
    }
}
