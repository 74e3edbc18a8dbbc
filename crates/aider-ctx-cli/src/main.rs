mod commands;
mod terminal;

use aider_ctx_core::{
	config::ConfigLayer, ignore_filter::normalize_path, tasks, walk::scan_directory, ContextSnapshot,
	EventRegistry, EventTopic, FileMode, SessionConfig, SessionController, SessionError, StartOutcome,
	StartRequest, Subscription, TaskFileError,
};
use anyhow::{bail, Context};
use clap::Parser;
use commands::ShellCommand;
use std::{
	collections::{BTreeMap, BTreeSet},
	env,
	fs::{File, OpenOptions},
	io::{self, Write},
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Mutex as StdMutex,
	},
	time::Duration,
};
use terminal::{resolve_use_pty, ShellLauncher};
use tokio::{
	io::{AsyncBufReadExt, BufReader},
	sync::mpsc,
	time::timeout,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt::MakeWriter, EnvFilter};

const EXIT_WAIT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(
	name = "aider-ctx",
	about = "Run aider in a workspace and keep its file context in step with your working set"
)]
struct Args {
	/// Workspace root; defaults to AIDER_CTX_ROOT, then the current directory.
	#[arg(long)]
	root: Option<PathBuf>,
	#[arg(long)]
	executable: Option<String>,
	/// Track files as they are opened.
	#[arg(long)]
	auto_add: bool,
	/// Untrack files as they are closed.
	#[arg(long)]
	auto_drop: bool,
	/// A file already open in the editor. Repeatable.
	#[arg(long = "open", value_name = "PATH")]
	open: Vec<PathBuf>,
	#[arg(long, default_value = "")]
	log_dir: String,
	#[arg(long)]
	no_pty: bool,
	/// Wait for :start instead of launching aider right away.
	#[arg(long)]
	no_start: bool,
}

/// Everything the event loop reacts to, in arrival order.
#[derive(Debug)]
pub enum HostEvent {
	Input(String),
	InputClosed,
	Interrupt,
	ProcessExited { generation: u64, code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
	Continue,
	Exit,
}

/// Where tracing output goes: the per-process log file, stderr when asked
/// for, or both. The fmt layer clones one per event.
#[derive(Clone)]
struct LogSink {
	file: Option<Arc<StdMutex<File>>>,
	stderr: bool,
}

/// Registry for the editor-side topics. The shell has no real editor, so
/// `:open` and `:close` stand in for its notifications; this only keeps
/// count of who is listening.
#[derive(Clone, Default)]
struct HostRegistry {
	live: Arc<StdMutex<BTreeMap<EventTopic, usize>>>,
}

impl HostRegistry {
	fn listening(&self) -> Vec<EventTopic> {
		match self.live.lock() {
			Ok(live) => live
				.iter()
				.filter(|(_, count)| **count > 0)
				.map(|(topic, _)| *topic)
				.collect(),
			Err(_) => Vec::new(),
		}
	}
}

impl EventRegistry for HostRegistry {
	fn subscribe(&mut self, topic: EventTopic) -> Subscription {
		if let Ok(mut live) = self.live.lock() {
			*live.entry(topic).or_insert(0) += 1;
		}
		debug!(%topic, "subscribed");
		let live = Arc::clone(&self.live);
		Subscription::new(topic, move || {
			if let Ok(mut live) = live.lock() {
				if let Some(count) = live.get_mut(&topic) {
					*count = count.saturating_sub(1);
				}
			}
			debug!(%topic, "unsubscribed");
		})
	}
}

struct Host {
	controller: SessionController,
	registry: HostRegistry,
	root: PathBuf,
	open_files: BTreeSet<PathBuf>,
	generation: Arc<AtomicU64>,
	quitting: bool,
}

#[tokio::main]
async fn main() {
	let args = Args::parse();
	let code = match run(args).await {
		Ok(code) => code,
		Err(err) => {
			eprintln!("aider-ctx: {err:#}");
			1
		}
	};
	// stdin is read on a blocking thread that cannot be cancelled.
	std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<i32> {
	let root = resolve_workspace_root(args.root.as_deref())?;
	if let Some(path) = init_logging(&resolve_log_dir(&args.log_dir)) {
		debug!(path = %path.display(), "log_file_opened");
	}

	let (mut config, config_errors) = SessionConfig::resolve(Some(&root));
	for err in &config_errors {
		notice(&format!("config ignored: {err}"));
	}
	config.apply(cli_layer(&args));
	info!(
		root = %root.display(),
		executable = %config.executable_path,
		auto_add = config.auto_add_on_open,
		auto_drop = config.auto_drop_on_close,
		"aider_ctx_start"
	);

	let (events_tx, mut events_rx) = mpsc::channel::<HostEvent>(64);
	let generation = Arc::new(AtomicU64::new(0));
	let launcher = ShellLauncher::new(
		resolve_use_pty(args.no_pty),
		events_tx.clone(),
		Arc::clone(&generation),
	);
	let registry = HostRegistry::default();
	let mut controller = SessionController::new(config, Box::new(launcher), Box::new(registry.clone()));
	controller.set_observer(Box::new(|snapshot: &ContextSnapshot| notice(&snapshot.status_line())));
	controller.set_dirty_hook(Box::new(|dirty: bool| debug!(dirty, "dirty_changed")));

	spawn_input_reader(events_tx.clone());
	spawn_interrupt_listener(events_tx);

	let mut host = Host {
		controller,
		registry,
		open_files: args.open.iter().map(|path| resolve_path(&root, path)).collect(),
		root,
		generation,
		quitting: false,
	};
	if !args.no_start {
		host.start();
	}
	notice("type :help for commands");

	loop {
		let event = if host.quitting {
			match timeout(EXIT_WAIT, events_rx.recv()).await {
				Ok(event) => event,
				Err(_) => {
					warn!("exit_wait_timeout");
					break;
				}
			}
		} else {
			events_rx.recv().await
		};
		let Some(event) = event else {
			break;
		};
		let flow = match event {
			HostEvent::Input(line) => match commands::parse_line(&line) {
				Ok(Some(command)) => host.handle(command).await,
				Ok(None) => Flow::Continue,
				Err(message) => {
					notice(&message);
					Flow::Continue
				}
			},
			HostEvent::InputClosed | HostEvent::Interrupt => host.quit(),
			HostEvent::ProcessExited { generation, code } => host.on_process_exited(generation, code),
		};
		if flow == Flow::Exit {
			break;
		}
	}

	info!("aider_ctx_exit");
	Ok(0)
}

impl Host {
	async fn handle(&mut self, command: ShellCommand) -> Flow {
		if command == ShellCommand::Quit {
			return self.quit();
		}
		if let Err(err) = self.dispatch(command).await {
			notice(&format!("{err:#}"));
		}
		Flow::Continue
	}

	async fn dispatch(&mut self, command: ShellCommand) -> anyhow::Result<()> {
		match command {
			ShellCommand::Start => {
				self.start();
				Ok(())
			}
			ShellCommand::Stop => {
				if !self.controller.stop() {
					notice("no aider session is running");
				}
				Ok(())
			}
			ShellCommand::Add(paths) => self.add(&paths, FileMode::Writable),
			ShellCommand::Read(paths) => self.add(&paths, FileMode::ReadOnly),
			ShellCommand::Drop(path) => {
				let path = resolve_path(&self.root, Path::new(&path));
				if !self.controller.drop_file(&path)? {
					notice(&format!("not tracked: {}", path.display()));
				}
				Ok(())
			}
			ShellCommand::Clear => self.controller.clear().map(|_| ()).map_err(Into::into),
			ShellCommand::Dir(path) => self.add_directory(&path).await,
			ShellCommand::Sync => {
				let report = self.controller.sync()?;
				notice(report.message());
				Ok(())
			}
			ShellCommand::List => self.controller.list().map_err(Into::into),
			ShellCommand::Open(path) => {
				let path = resolve_path(&self.root, Path::new(&path));
				self.open_files.insert(path.clone());
				self.controller.on_file_focused(&path);
				Ok(())
			}
			ShellCommand::Close(path) => {
				let path = resolve_path(&self.root, Path::new(&path));
				self.open_files.remove(&path);
				self.controller.on_file_closed(&path);
				Ok(())
			}
			ShellCommand::Tasks => self.list_tasks(),
			ShellCommand::TasksInit => {
				let path = tasks::scaffold_tasks(&self.root)?;
				notice(&format!("created {}", path.display()));
				Ok(())
			}
			ShellCommand::Task(index) => self.run_task(index),
			ShellCommand::Status => {
				self.print_status();
				Ok(())
			}
			ShellCommand::Help => {
				notice(commands::HELP);
				Ok(())
			}
			ShellCommand::Quit => Ok(()),
			ShellCommand::Forward(text) => self.controller.send_command(&text).map_err(Into::into),
		}
	}

	fn start(&mut self) {
		let request = StartRequest {
			workspace_root: Some(self.root.clone()),
			open_files: self.open_files.iter().cloned().collect(),
		};
		match self.controller.start(request) {
			Ok(StartOutcome::Started(report)) => {
				debug!(lines = ?report.lines(), "initial_sync");
			}
			Ok(StartOutcome::AlreadyActive) => notice("aider is already running"),
			Err(err) => notice(&format!("could not start aider: {err}")),
		}
	}

	fn add(&mut self, raw: &[String], mode: FileMode) -> anyhow::Result<()> {
		let paths: Vec<PathBuf> = raw
			.iter()
			.map(|path| resolve_path(&self.root, Path::new(path)))
			.collect();
		if !self.controller.add(&paths, mode, false)? {
			notice("nothing new to track");
		}
		Ok(())
	}

	/// The walk runs on the blocking pool; no other event is handled until
	/// it finishes, so the add lands against the state it was started from.
	async fn add_directory(&mut self, raw: &str) -> anyhow::Result<()> {
		let dir = resolve_path(&self.root, Path::new(raw));
		if !dir.is_dir() {
			bail!("not a directory: {}", dir.display());
		}
		let filter = self.controller.directory_filter(&dir)?;
		let walk_dir = dir.clone();
		let scan = tokio::task::spawn_blocking(move || scan_directory(&filter, &walk_dir))
			.await
			.context("directory walk panicked")??;
		self.controller.add(&scan.files, FileMode::Writable, false)?;
		info!(
			dir = %dir.display(),
			files = scan.files.len(),
			pruned = scan.pruned.len(),
			"directory_added"
		);
		notice(&format!(
			"{} files found under {} ({} ignored entries skipped)",
			scan.files.len(),
			dir.display(),
			scan.pruned.len()
		));
		Ok(())
	}

	fn list_tasks(&self) -> anyhow::Result<()> {
		match tasks::load_tasks(&self.root) {
			Ok(list) => {
				for (index, task) in list.iter().enumerate() {
					if task.description.is_empty() {
						notice(&format!("{:>2}. {}", index + 1, task.label));
					} else {
						notice(&format!("{:>2}. {} - {}", index + 1, task.label, task.description));
					}
				}
				Ok(())
			}
			Err(TaskFileError::Missing(path)) => {
				notice(&format!("no task file at {}; run :tasks init to create one", path.display()));
				Ok(())
			}
			Err(err) => Err(err.into()),
		}
	}

	fn run_task(&mut self, index: usize) -> anyhow::Result<()> {
		if !self.controller.is_active() {
			return Err(SessionError::NoSession.into());
		}
		let list = match tasks::load_tasks(&self.root) {
			Ok(list) => list,
			Err(TaskFileError::Missing(path)) => {
				bail!("no task file at {}; run :tasks init to create one", path.display())
			}
			Err(err) => return Err(err.into()),
		};
		let Some(task) = list.get(index - 1) else {
			bail!("no task {index}; {} defined", list.len());
		};
		self.controller.run_task(task)?;
		Ok(())
	}

	fn print_status(&self) {
		let snapshot = self.controller.snapshot();
		notice(&snapshot.status_line());
		for file in &snapshot.files {
			let shown = file.path.strip_prefix(&self.root).unwrap_or(&file.path);
			if file.mode.is_read_only() {
				notice(&format!("  {} (read-only)", shown.display()));
			} else {
				notice(&format!("  {}", shown.display()));
			}
		}
		let listening = self.registry.listening();
		if !listening.is_empty() {
			let topics: Vec<&str> = listening.iter().map(EventTopic::as_str).collect();
			notice(&format!("editor events: {}", topics.join(", ")));
		}
	}

	fn quit(&mut self) -> Flow {
		if self.quitting {
			warn!("forced_exit");
			return Flow::Exit;
		}
		if self.controller.stop() {
			self.quitting = true;
			return Flow::Continue;
		}
		Flow::Exit
	}

	fn on_process_exited(&mut self, generation: u64, code: i32) -> Flow {
		let current = self.generation.load(Ordering::SeqCst);
		if generation != current {
			debug!(generation, current, "stale_exit_ignored");
			return Flow::Continue;
		}
		info!(code, "aider_exited");
		if self.controller.on_process_exited() {
			notice(&format!("aider exited ({code})"));
		}
		if self.quitting {
			Flow::Exit
		} else {
			Flow::Continue
		}
	}
}

fn cli_layer(args: &Args) -> ConfigLayer {
	ConfigLayer {
		executable_path: args.executable.clone().filter(|value| !value.trim().is_empty()),
		auto_add_on_open: args.auto_add.then_some(true),
		auto_drop_on_close: args.auto_drop.then_some(true),
		clear_history_on_stop: None,
	}
}

fn spawn_input_reader(events: mpsc::Sender<HostEvent>) {
	tokio::spawn(async move {
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		loop {
			match lines.next_line().await {
				Ok(Some(line)) => {
					if events.send(HostEvent::Input(line)).await.is_err() {
						return;
					}
				}
				Ok(None) => break,
				Err(err) => {
					warn!("stdin_read_failed: {err}");
					break;
				}
			}
		}
		let _ = events.send(HostEvent::InputClosed).await;
	});
}

fn spawn_interrupt_listener(events: mpsc::Sender<HostEvent>) {
	tokio::spawn(async move {
		while tokio::signal::ctrl_c().await.is_ok() {
			if events.send(HostEvent::Interrupt).await.is_err() {
				break;
			}
		}
	});
}

fn notice(message: &str) {
	let mut stderr = io::stderr();
	for line in message.lines() {
		let _ = writeln!(stderr, "[aider-ctx] {line}");
	}
}

fn resolve_workspace_root(flag: Option<&Path>) -> anyhow::Result<PathBuf> {
	let candidate = match flag {
		Some(path) => path.to_path_buf(),
		None => match env::var("AIDER_CTX_ROOT") {
			Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
			_ => env::current_dir().context("reading current directory")?,
		},
	};
	let root = candidate
		.canonicalize()
		.with_context(|| format!("workspace root {}", candidate.display()))?;
	if !root.is_dir() {
		bail!("workspace root is not a directory: {}", root.display());
	}
	Ok(root)
}

/// Absolute, with `.` and `..` resolved so prefix and ignore checks see the
/// real location.
fn resolve_path(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		normalize_path(path)
	} else {
		normalize_path(&root.join(path))
	}
}

/// Installs the global subscriber. Returns the log file path when one was
/// opened.
fn init_logging(log_dir: &str) -> Option<PathBuf> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(resolve_log_level()));
	let stderr = resolve_log_stderr();
	let (sink, path) = match LogSink::open(log_dir, stderr) {
		Ok(opened) => opened,
		Err(err) => {
			eprintln!("log_file_error: {err}");
			(LogSink { file: None, stderr }, None)
		}
	};
	if sink.is_silent() {
		return None;
	}
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(false)
		.with_target(false)
		.with_writer(sink)
		.try_init()
		.ok()?;
	path
}

impl LogSink {
	fn open(log_dir: &str, stderr: bool) -> io::Result<(Self, Option<PathBuf>)> {
		if log_dir.trim().is_empty() {
			return Ok((Self { file: None, stderr }, None));
		}
		let dir = PathBuf::from(log_dir);
		std::fs::create_dir_all(&dir)?;
		let path = dir.join(format!("aider-ctx-{}.log", std::process::id()));
		let file = OpenOptions::new().create(true).append(true).open(&path)?;
		let sink = Self {
			file: Some(Arc::new(StdMutex::new(file))),
			stderr,
		};
		Ok((sink, Some(path)))
	}

	fn is_silent(&self) -> bool {
		self.file.is_none() && !self.stderr
	}

	fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<Option<T>> {
		let Some(file) = &self.file else {
			return Ok(None);
		};
		let mut file = file
			.lock()
			.map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
		op(&mut *file).map(Some)
	}
}

impl<'a> MakeWriter<'a> for LogSink {
	type Writer = LogSink;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

impl Write for LogSink {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.with_file(|file| file.write_all(buf))?;
		if self.stderr {
			io::stderr().write_all(buf)?;
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.with_file(|file| file.flush())?;
		if self.stderr {
			io::stderr().flush()?;
		}
		Ok(())
	}
}

fn resolve_log_level() -> String {
	env::var("AIDER_CTX_LOG_LEVEL")
		.ok()
		.filter(|level| !level.trim().is_empty())
		.unwrap_or_else(|| "info".to_string())
}

/// `none` turns the log file off.
fn resolve_log_dir(flag: &str) -> String {
	let value = if !flag.trim().is_empty() {
		flag.to_string()
	} else {
		match env::var("AIDER_CTX_LOG_DIR") {
			Ok(value) if !value.trim().is_empty() => value,
			_ => ".aider-ctx/logs".to_string(),
		}
	};
	if value.trim().eq_ignore_ascii_case("none") {
		String::new()
	} else {
		value
	}
}

fn resolve_log_stderr() -> bool {
	env::var("AIDER_CTX_LOG_STDERR")
		.ok()
		.and_then(|value| aider_ctx_core::config::parse_bool(&value))
		.unwrap_or(false)
}
