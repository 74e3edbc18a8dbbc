use crate::HostEvent;
use aider_ctx_core::{LaunchSpec, ProcessLauncher, ProcessSink};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::{
	env,
	io::{self, IsTerminal, Read, Write},
	process::Stdio,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	process::Command,
	sync::{mpsc, oneshot},
};
use tracing::{info, warn};

/// Opens a shell (pty when available, pipes otherwise) that the controller
/// types the aider invocation into. Each launch bumps the generation so exit
/// reports from an earlier shell can be told apart.
pub struct ShellLauncher {
	use_pty: bool,
	events: mpsc::Sender<HostEvent>,
	generation: Arc<AtomicU64>,
}

impl ShellLauncher {
	pub fn new(use_pty: bool, events: mpsc::Sender<HostEvent>, generation: Arc<AtomicU64>) -> Self {
		Self {
			use_pty,
			events,
			generation,
		}
	}
}

impl ProcessLauncher for ShellLauncher {
	fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessSink>> {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let shell = resolve_shell();
		info!(shell = %shell, cwd = %spec.cwd.display(), generation, pty = self.use_pty, "shell_launch");
		if self.use_pty {
			match spawn_pty(&shell, spec, generation, self.events.clone()) {
				Ok(sink) => return Ok(Box::new(sink)),
				Err(err) => warn!("pty_spawn_failed: {err}; falling back to pipes"),
			}
		}
		let sink = spawn_piped(&shell, spec, generation, self.events.clone())?;
		Ok(Box::new(sink))
	}
}

struct PtySink {
	_master: Box<dyn MasterPty + Send>,
	writer: Box<dyn Write + Send>,
	killer: Box<dyn ChildKiller + Send + Sync>,
	title: String,
}

impl ProcessSink for PtySink {
	fn send_line(&mut self, line: &str) -> io::Result<()> {
		self.writer.write_all(line.as_bytes())?;
		self.writer.write_all(b"\r")?;
		self.writer.flush()
	}

	fn show(&mut self) {
		set_terminal_title(&self.title);
	}

	fn dispose(&mut self) {
		if let Err(err) = self.killer.kill() {
			warn!("pty_kill_failed: {err}");
		}
	}
}

struct PipedSink {
	lines: mpsc::UnboundedSender<String>,
	kill: Option<oneshot::Sender<()>>,
	title: String,
}

impl ProcessSink for PipedSink {
	fn send_line(&mut self, line: &str) -> io::Result<()> {
		self.lines
			.send(format!("{line}\n"))
			.map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "aider process is gone"))
	}

	fn show(&mut self) {
		set_terminal_title(&self.title);
	}

	fn dispose(&mut self) {
		if let Some(kill) = self.kill.take() {
			let _ = kill.send(());
		}
	}
}

fn spawn_pty(
	shell: &str,
	spec: &LaunchSpec,
	generation: u64,
	events: mpsc::Sender<HostEvent>,
) -> io::Result<PtySink> {
	let pty_system = native_pty_system();
	let pair = pty_system
		.openpty(resolve_pty_size())
		.map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

	let mut builder = CommandBuilder::new(shell);
	builder.cwd(&spec.cwd);
	if env::var("TERM").is_err() {
		builder.env("TERM", "xterm-256color");
	}

	let mut child = pair
		.slave
		.spawn_command(builder)
		.map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
	drop(pair.slave);

	let killer = child.clone_killer();
	let mut reader = pair
		.master
		.try_clone_reader()
		.map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
	let writer = pair
		.master
		.take_writer()
		.map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

	std::thread::spawn(move || {
		let mut stdout = io::stdout();
		let mut buffer = [0u8; 8192];
		loop {
			let read = match reader.read(&mut buffer) {
				Ok(0) => break,
				Ok(count) => count,
				Err(_) => break,
			};
			let _ = stdout.write_all(&buffer[..read]);
			let _ = stdout.flush();
		}
	});

	std::thread::spawn(move || {
		let code = match child.wait() {
			Ok(status) => status.exit_code() as i32,
			Err(_) => 1,
		};
		let _ = events.blocking_send(HostEvent::ProcessExited { generation, code });
	});

	Ok(PtySink {
		_master: pair.master,
		writer,
		killer,
		title: spec.title.clone(),
	})
}

fn spawn_piped(
	shell: &str,
	spec: &LaunchSpec,
	generation: u64,
	events: mpsc::Sender<HostEvent>,
) -> io::Result<PipedSink> {
	let mut child = Command::new(shell);
	child
		.current_dir(&spec.cwd)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	let mut child = child.spawn()?;

	let mut stdin = child
		.stdin
		.take()
		.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stdin unavailable"))?;
	let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
	tokio::spawn(async move {
		while let Some(line) = line_rx.recv().await {
			if stdin.write_all(line.as_bytes()).await.is_err() {
				break;
			}
			let _ = stdin.flush().await;
		}
	});

	if let Some(stdout) = child.stdout.take() {
		tokio::spawn(async move {
			forward_stream(stdout, tokio::io::stdout()).await;
		});
	}
	if let Some(stderr) = child.stderr.take() {
		tokio::spawn(async move {
			forward_stream(stderr, tokio::io::stderr()).await;
		});
	}

	let (kill_tx, kill_rx) = oneshot::channel::<()>();
	tokio::spawn(async move {
		let code = tokio::select! {
			status = child.wait() => {
				match status {
					Ok(status) => status.code().unwrap_or(0),
					Err(_) => 1,
				}
			}
			_ = kill_rx => {
				let _ = child.kill().await;
				1
			}
		};
		let _ = events.send(HostEvent::ProcessExited { generation, code }).await;
	});

	Ok(PipedSink {
		lines: line_tx,
		kill: Some(kill_tx),
		title: spec.title.clone(),
	})
}

async fn forward_stream<R, W>(reader: R, mut writer: W)
where
	R: tokio::io::AsyncRead + Unpin,
	W: tokio::io::AsyncWrite + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		if writer.write_all(line.as_bytes()).await.is_err() {
			break;
		}
		if writer.write_all(b"\n").await.is_err() {
			break;
		}
		let _ = writer.flush().await;
	}
}

fn set_terminal_title(title: &str) {
	let mut stdout = io::stdout();
	if !stdout.is_terminal() {
		return;
	}
	let _ = write!(stdout, "\x1b]0;{title}\x07");
	let _ = stdout.flush();
}

pub fn resolve_use_pty(no_pty: bool) -> bool {
	if no_pty {
		return false;
	}
	if let Ok(value) = env::var("AIDER_CTX_PTY") {
		if let Some(parsed) = aider_ctx_core::config::parse_bool(&value) {
			return parsed;
		}
	}
	io::stdout().is_terminal()
}

fn resolve_shell() -> String {
	for key in ["AIDER_CTX_SHELL", "SHELL"] {
		if let Ok(value) = env::var(key) {
			if !value.trim().is_empty() {
				return value;
			}
		}
	}
	if cfg!(windows) {
		"cmd.exe".to_string()
	} else {
		"sh".to_string()
	}
}

/// Initial pty size from the shell's `COLUMNS`/`LINES`, falling back to
/// portable-pty's 80x24 when a value is unset or not a positive number.
fn resolve_pty_size() -> PtySize {
	let fallback = PtySize::default();
	PtySize {
		rows: env_dimension("LINES").unwrap_or(fallback.rows),
		cols: env_dimension("COLUMNS").unwrap_or(fallback.cols),
		..fallback
	}
}

fn env_dimension(key: &str) -> Option<u16> {
	env::var(key)
		.ok()
		.and_then(|value| value.trim().parse::<u16>().ok())
		.filter(|value| *value > 0)
}
