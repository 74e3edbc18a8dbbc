//! Session lifecycle and working-set reconciliation.
//!
//! `SessionController` owns the assistant process handle, the tracked file
//! store, the dirty flag, and the ignore filter. Every handler runs to
//! completion on the caller's event loop, so the controller is plain `&mut`
//! state with no locking.
//!
//! Syncing always clears the assistant's context before re-adding the store:
//! the process cannot be queried for what it currently holds, so full
//! replacement is the only way to converge on the store's exact contents.

use crate::config::SessionConfig;
use crate::directive::Directive;
use crate::dirty::{DirtyHook, DirtyTracker};
use crate::error::SessionError;
use crate::events::{EventRegistry, EventTopic, Subscription};
use crate::ignore_filter::{normalize_path, IgnoreFilter};
use crate::process::{LaunchSpec, ProcessLauncher, ProcessSink};
use crate::store::{ContextSnapshot, ContextStore};
use crate::tasks::AiderTask;
use crate::walk::scan_directory;
use crate::FileMode;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const TERMINAL_TITLE: &str = "Aider";
pub const SYNC_CONFIRMATION: &str = "Aider context synced.";

pub type SnapshotObserver = Box<dyn FnMut(&ContextSnapshot) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub workspace_root: Option<PathBuf>,
    /// Files currently open in the editor; seeds the store when
    /// `auto_add_on_open` is set.
    pub open_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SyncReport),
    AlreadyActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub directives: Vec<Directive>,
    pub writable: usize,
    pub read_only: usize,
}

impl SyncReport {
    pub fn lines(&self) -> Vec<String> {
        self.directives.iter().map(Directive::to_line).collect()
    }

    pub fn message(&self) -> &'static str {
        SYNC_CONFIRMATION
    }
}

struct ActiveSession {
    sink: Box<dyn ProcessSink>,
    root: PathBuf,
    filter: IgnoreFilter,
    subscriptions: Vec<Subscription>,
    stopping: bool,
}

impl ActiveSession {
    fn listening(&self, topic: EventTopic) -> bool {
        self.subscriptions
            .iter()
            .any(|sub| sub.topic() == topic && !sub.is_disposed())
    }
}

pub struct SessionController {
    config: SessionConfig,
    launcher: Box<dyn ProcessLauncher>,
    registry: Box<dyn EventRegistry>,
    session: Option<ActiveSession>,
    store: ContextStore,
    dirty: DirtyTracker,
    observer: Option<SnapshotObserver>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        launcher: Box<dyn ProcessLauncher>,
        registry: Box<dyn EventRegistry>,
    ) -> Self {
        Self {
            config,
            launcher,
            registry,
            session: None,
            store: ContextStore::new(),
            dirty: DirtyTracker::new(),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: SnapshotObserver) {
        self.observer = Some(observer);
    }

    pub fn set_dirty_hook(&mut self, hook: DirtyHook) {
        self.dirty.set_hook(hook);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Options are read at the moment each event is handled, so updates
    /// apply to the running session.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.root.as_path())
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            active: self.is_active(),
            dirty: self.dirty.is_dirty(),
            files: self.store.entries(),
        }
    }

    pub fn start(&mut self, request: StartRequest) -> Result<StartOutcome, SessionError> {
        if let Some(session) = self.session.as_mut() {
            session.sink.show();
            return Ok(StartOutcome::AlreadyActive);
        }

        let root = request
            .workspace_root
            .map(|root| normalize_path(&root))
            .ok_or(SessionError::NoWorkspace)?;
        let filter = IgnoreFilter::load(&root);

        let spec = LaunchSpec {
            cwd: root.clone(),
            title: TERMINAL_TITLE.to_string(),
        };
        let mut sink = self
            .launcher
            .launch(&spec)
            .map_err(|source| SessionError::Launch {
                program: self.config.executable_path.clone(),
                source,
            })?;
        if let Err(err) = sink.send_line(&self.config.executable_path) {
            sink.dispose();
            return Err(SessionError::Sink(err));
        }
        sink.show();

        let subscriptions = EventTopic::AUTO_TRACK
            .iter()
            .map(|topic| self.registry.subscribe(*topic))
            .collect();

        info!(
            root = %root.display(),
            executable = %self.config.executable_path,
            rules = filter.rule_count(),
            "session_started"
        );
        self.session = Some(ActiveSession {
            sink,
            root,
            filter,
            subscriptions,
            stopping: false,
        });
        self.store.clear();
        self.dirty.clear();

        if self.config.auto_add_on_open && !request.open_files.is_empty() {
            self.add(&request.open_files, FileMode::Writable, true)?;
        }

        let report = self.sync()?;
        Ok(StartOutcome::Started(report))
    }

    /// Dispose the process. The session ends when the host reports the exit
    /// through [`Self::on_process_exited`].
    pub fn stop(&mut self) -> bool {
        let clear_history = self.config.clear_history_on_stop;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.stopping {
            return false;
        }
        if clear_history {
            if let Err(err) = session.sink.send_line(&Directive::ClearHistory.to_line()) {
                warn!("clear_history_failed: {err}");
            }
        }
        session.stopping = true;
        session.sink.dispose();
        info!("session_stop_requested");
        true
    }

    /// Termination handling. Safe to call any number of times.
    pub fn on_process_exited(&mut self) -> bool {
        let ended = self.session.take();
        let was_active = ended.is_some();
        if let Some(mut session) = ended {
            for sub in session.subscriptions.iter_mut() {
                sub.dispose();
            }
            info!(files = self.store.len(), "session_terminated");
        }
        self.store.clear();
        self.dirty.clear();
        if was_active {
            self.notify();
        }
        was_active
    }

    pub fn add<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        mode: FileMode,
        silent: bool,
    ) -> Result<bool, SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if paths.is_empty() {
            return Ok(false);
        }
        let changed = self.store.add(paths, mode, &session.filter);
        if !changed {
            debug!(count = paths.len(), %mode, "add_no_change");
            return Ok(false);
        }
        if !silent {
            self.dirty.mark();
        }
        debug!(count = paths.len(), %mode, silent, "context_added");
        self.notify();
        Ok(true)
    }

    pub fn drop_file(&mut self, path: &Path) -> Result<bool, SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NoSession);
        }
        if !self.store.drop_path(path) {
            return Ok(false);
        }
        self.dirty.mark();
        debug!(path = %path.display(), "context_dropped");
        self.notify();
        Ok(true)
    }

    /// Stage removal of every file; takes effect at the next sync.
    pub fn clear(&mut self) -> Result<bool, SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NoSession);
        }
        if !self.store.clear() {
            return Ok(false);
        }
        self.dirty.mark();
        info!("context_cleared");
        self.notify();
        Ok(true)
    }

    /// Ignore rules for a bulk add under `dir`, freshly loaded from the
    /// workspace root. Hosts that walk off the event loop use this, then
    /// pass the collected files to [`Self::add`].
    /// `dir` is checked in normalized form, so `..` cannot climb out.
    pub fn directory_filter(&self, dir: &Path) -> Result<IgnoreFilter, SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        let dir = normalize_path(dir);
        if !dir.starts_with(&session.root) {
            return Err(SessionError::OutsideWorkspace {
                path: dir,
                root: session.root.clone(),
            });
        }
        Ok(IgnoreFilter::load(&session.root))
    }

    /// Walk `dir` to completion, then add every surviving file as writable.
    /// Returns the number of files collected.
    pub fn add_directory(&mut self, dir: &Path) -> Result<usize, SessionError> {
        let dir = normalize_path(dir);
        let filter = self.directory_filter(&dir)?;
        let scan = scan_directory(&filter, &dir)?;
        self.add(&scan.files, FileMode::Writable, false)?;
        info!(dir = %dir.display(), files = scan.files.len(), "directory_added");
        Ok(scan.files.len())
    }

    pub fn sync(&mut self) -> Result<SyncReport, SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NoSession);
        }

        let (writable, read_only) = self.store.partition();
        let report = SyncReport {
            writable: writable.len(),
            read_only: read_only.len(),
            directives: sync_directives(&writable, &read_only),
        };

        for directive in &report.directives {
            self.send(directive)?;
        }

        self.dirty.clear();
        info!(
            writable = report.writable,
            read_only = report.read_only,
            "context_synced"
        );
        self.notify();
        Ok(report)
    }

    pub fn list(&mut self) -> Result<(), SessionError> {
        self.send(&Directive::List)?;
        self.show();
        Ok(())
    }

    /// Forward a raw line to the assistant.
    pub fn send_command(&mut self, command: &str) -> Result<(), SessionError> {
        self.send_line(command)?;
        self.show();
        Ok(())
    }

    pub fn run_task(&mut self, task: &AiderTask) -> Result<(), SessionError> {
        info!(label = %task.label, "task_run");
        self.send_command(&task.command)
    }

    pub fn show(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.sink.show();
        }
    }

    pub fn on_file_focused(&mut self, path: &Path) -> bool {
        if !self.listening(EventTopic::FileFocused) || !self.config.auto_add_on_open {
            return false;
        }
        if self.store.contains(path) {
            return false;
        }
        self.add(&[path], FileMode::Writable, false).unwrap_or(false)
    }

    pub fn on_file_closed(&mut self, path: &Path) -> bool {
        if !self.listening(EventTopic::FileClosed) || !self.config.auto_drop_on_close {
            return false;
        }
        self.drop_file(path).unwrap_or(false)
    }

    fn listening(&self, topic: EventTopic) -> bool {
        self.session
            .as_ref()
            .map(|session| session.listening(topic))
            .unwrap_or(false)
    }

    fn send(&mut self, directive: &Directive) -> Result<(), SessionError> {
        self.send_line(&directive.to_line())
    }

    /// A failed write means the process is gone; the session is torn down.
    fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if let Err(err) = session.sink.send_line(line) {
            warn!("sink_write_failed: {err}");
            self.on_process_exited();
            return Err(SessionError::Sink(err));
        }
        Ok(())
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        if let Some(observer) = self.observer.as_mut() {
            observer(&snapshot);
        }
    }
}

pub fn sync_directives(writable: &[&Path], read_only: &[&Path]) -> Vec<Directive> {
    let mut directives = vec![Directive::DropAll];
    if !writable.is_empty() {
        directives.push(Directive::Add(
            writable.iter().map(|path| path.to_path_buf()).collect(),
        ));
    }
    if !read_only.is_empty() {
        directives.push(Directive::Read(
            read_only.iter().map(|path| path.to_path_buf()).collect(),
        ));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullRegistry;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Wire {
        lines: Arc<Mutex<Vec<String>>>,
        shown: Arc<Mutex<usize>>,
        disposed: Arc<Mutex<usize>>,
        broken: Arc<Mutex<bool>>,
    }

    impl Wire {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().expect("lock").clone()
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.lock().expect("lock"))
        }
    }

    struct FakeSink(Wire);

    impl ProcessSink for FakeSink {
        fn send_line(&mut self, line: &str) -> io::Result<()> {
            if *self.0.broken.lock().expect("lock") {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.0.lines.lock().expect("lock").push(line.to_string());
            Ok(())
        }

        fn show(&mut self) {
            *self.0.shown.lock().expect("lock") += 1;
        }

        fn dispose(&mut self) {
            *self.0.disposed.lock().expect("lock") += 1;
        }
    }

    struct FakeLauncher {
        wire: Wire,
        launches: Arc<Mutex<Vec<LaunchSpec>>>,
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessSink>> {
            self.launches.lock().expect("lock").push(spec.clone());
            Ok(Box::new(FakeSink(self.wire.clone())))
        }
    }

    struct FailingLauncher;

    impl ProcessLauncher for FailingLauncher {
        fn launch(&mut self, _spec: &LaunchSpec) -> io::Result<Box<dyn ProcessSink>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no shell"))
        }
    }

    fn controller(config: SessionConfig) -> (SessionController, Wire, Arc<Mutex<Vec<LaunchSpec>>>) {
        let wire = Wire::default();
        let launches = Arc::new(Mutex::new(Vec::new()));
        let launcher = FakeLauncher {
            wire: wire.clone(),
            launches: Arc::clone(&launches),
        };
        let controller = SessionController::new(config, Box::new(launcher), Box::new(NullRegistry));
        (controller, wire, launches)
    }

    fn started(config: SessionConfig) -> (SessionController, Wire) {
        let (mut controller, wire, _) = controller(config);
        controller
            .start(StartRequest {
                workspace_root: Some(PathBuf::from("/work")),
                open_files: Vec::new(),
            })
            .expect("start");
        wire.take();
        (controller, wire)
    }

    #[test]
    fn start_without_workspace_spawns_nothing() {
        let (mut controller, wire, launches) = controller(SessionConfig::default());
        let err = controller.start(StartRequest::default()).expect_err("no root");
        assert!(matches!(err, SessionError::NoWorkspace));
        assert!(launches.lock().expect("lock").is_empty());
        assert!(wire.lines().is_empty());
        assert_eq!(controller.state(), SessionState::Inactive);
    }

    #[test]
    fn start_types_invocation_then_syncs() {
        let config = SessionConfig {
            executable_path: "aider --no-auto-commits".to_string(),
            ..SessionConfig::default()
        };
        let (mut controller, wire, launches) = controller(config);
        let outcome = controller
            .start(StartRequest {
                workspace_root: Some(PathBuf::from("/work")),
                open_files: vec![PathBuf::from("/work/a.ts")],
            })
            .expect("start");

        assert!(matches!(outcome, StartOutcome::Started(_)));
        assert_eq!(wire.lines(), vec!["aider --no-auto-commits", "/drop *"]);
        assert_eq!(launches.lock().expect("lock")[0].cwd, PathBuf::from("/work"));
        assert!(controller.store().is_empty());
        assert!(!controller.is_dirty());
    }

    #[test]
    fn start_seeds_open_files_silently() {
        let config = SessionConfig {
            auto_add_on_open: true,
            ..SessionConfig::default()
        };
        let (mut controller, wire, _) = controller(config);
        controller
            .start(StartRequest {
                workspace_root: Some(PathBuf::from("/work")),
                open_files: vec![PathBuf::from("/work/b.ts"), PathBuf::from("/work/a.ts")],
            })
            .expect("start");

        assert_eq!(
            wire.lines(),
            vec!["aider", "/drop *", "/add \"/work/a.ts\" \"/work/b.ts\""]
        );
        assert!(!controller.is_dirty());
    }

    #[test]
    fn second_start_only_shows_process() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("add");
        let shown_before = *wire.shown.lock().expect("lock");

        let outcome = controller
            .start(StartRequest {
                workspace_root: Some(PathBuf::from("/elsewhere")),
                open_files: Vec::new(),
            })
            .expect("start again");

        assert_eq!(outcome, StartOutcome::AlreadyActive);
        assert!(wire.lines().is_empty());
        assert_eq!(*wire.shown.lock().expect("lock"), shown_before + 1);
        assert_eq!(controller.store().len(), 1);
        assert!(controller.is_dirty());
        assert_eq!(controller.workspace_root(), Some(Path::new("/work")));
    }

    #[test]
    fn launch_failure_leaves_session_inactive() {
        let mut controller = SessionController::new(
            SessionConfig::default(),
            Box::new(FailingLauncher),
            Box::new(NullRegistry),
        );
        let err = controller
            .start(StartRequest {
                workspace_root: Some(PathBuf::from("/work")),
                open_files: Vec::new(),
            })
            .expect_err("launch fails");
        assert!(matches!(err, SessionError::Launch { .. }));
        assert!(!controller.is_active());
    }

    #[test]
    fn sync_emits_drop_add_read_in_order() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller.add(&["/a.ts"], FileMode::Writable, false).expect("add");
        controller.add(&["/b.ts"], FileMode::ReadOnly, false).expect("add");

        let report = controller.sync().expect("sync");
        assert_eq!(wire.lines(), vec!["/drop *", "/add \"/a.ts\"", "/read \"/b.ts\""]);
        assert_eq!(report.lines(), wire.lines());
        assert_eq!((report.writable, report.read_only), (1, 1));
        assert_eq!(report.message(), "Aider context synced.");
    }

    #[test]
    fn sync_of_empty_store_only_clears() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller.sync().expect("sync");
        assert_eq!(wire.lines(), vec!["/drop *"]);
    }

    #[test]
    fn sync_is_idempotent() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller
            .add(&["/work/x.rs", "/work/y.rs"], FileMode::Writable, false)
            .expect("add");
        let before = controller.store().clone();
        controller.sync().expect("first");
        let first = wire.take();
        controller.sync().expect("second");
        let second = wire.take();
        assert_eq!(first, second);
        assert_eq!(controller.store(), &before);
    }

    #[test]
    fn dirty_follows_mutations_and_sync() {
        let (mut controller, _wire) = started(SessionConfig::default());
        assert!(controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("add"));
        assert!(controller.is_dirty());
        controller.sync().expect("sync");
        assert!(!controller.is_dirty());

        assert!(!controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("add"));
        assert!(!controller.drop_file(Path::new("/work/missing.ts")).expect("drop"));
        assert!(!controller.is_dirty());

        assert!(controller.drop_file(Path::new("/work/a.ts")).expect("drop"));
        assert!(controller.is_dirty());
        controller.sync().expect("sync");

        assert!(!controller.clear().expect("clear on empty"));
        assert!(!controller.is_dirty());
    }

    #[test]
    fn silent_add_changes_store_without_dirtying() {
        let (mut controller, _wire) = started(SessionConfig::default());
        assert!(controller.add(&["/work/a.ts"], FileMode::Writable, true).expect("add"));
        assert!(!controller.is_dirty());
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn clear_stages_removal_until_sync() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller
            .add(&["/work/a.ts", "/work/b.ts"], FileMode::ReadOnly, false)
            .expect("add");
        controller.sync().expect("sync");
        wire.take();

        assert!(controller.clear().expect("clear"));
        assert!(controller.is_dirty());
        assert!(wire.lines().is_empty());
        controller.sync().expect("sync");
        assert_eq!(wire.lines(), vec!["/drop *"]);
    }

    #[test]
    fn operations_require_a_session() {
        let (mut controller, _, _) = controller(SessionConfig::default());
        assert!(matches!(controller.sync(), Err(SessionError::NoSession)));
        assert!(matches!(
            controller.add(&["/work/a.ts"], FileMode::Writable, false),
            Err(SessionError::NoSession)
        ));
        assert!(matches!(
            controller.drop_file(Path::new("/work/a.ts")),
            Err(SessionError::NoSession)
        ));
        assert!(matches!(controller.clear(), Err(SessionError::NoSession)));
        assert!(matches!(controller.list(), Err(SessionError::NoSession)));
        assert!(matches!(
            controller.send_command("/help"),
            Err(SessionError::NoSession)
        ));
        assert!(!controller.stop());
    }

    #[test]
    fn focus_and_close_follow_config() {
        let config = SessionConfig {
            auto_add_on_open: true,
            auto_drop_on_close: false,
            ..SessionConfig::default()
        };
        let (mut controller, _wire) = started(config);

        assert!(controller.on_file_focused(Path::new("/work/a.ts")));
        assert!(controller.is_dirty());
        assert!(!controller.on_file_focused(Path::new("/work/a.ts")));
        assert!(!controller.on_file_closed(Path::new("/work/a.ts")));
        assert!(controller.store().contains(Path::new("/work/a.ts")));

        let mut config = controller.config().clone();
        config.auto_drop_on_close = true;
        controller.set_config(config);
        assert!(controller.on_file_closed(Path::new("/work/a.ts")));
        assert!(controller.store().is_empty());
    }

    #[test]
    fn focus_keeps_existing_read_only_mode() {
        let config = SessionConfig {
            auto_add_on_open: true,
            ..SessionConfig::default()
        };
        let (mut controller, _wire) = started(config);
        controller.add(&["/work/doc.md"], FileMode::ReadOnly, false).expect("add");
        assert!(!controller.on_file_focused(Path::new("/work/doc.md")));
        assert_eq!(
            controller.store().mode_of(Path::new("/work/doc.md")),
            Some(FileMode::ReadOnly)
        );
    }

    #[test]
    fn focus_events_are_ignored_while_inactive() {
        let config = SessionConfig {
            auto_add_on_open: true,
            auto_drop_on_close: true,
            ..SessionConfig::default()
        };
        let (mut controller, _, _) = controller(config);
        assert!(!controller.on_file_focused(Path::new("/work/a.ts")));
        assert!(!controller.on_file_closed(Path::new("/work/a.ts")));
    }

    #[test]
    fn stop_disposes_and_exit_tears_down() {
        let config = SessionConfig {
            clear_history_on_stop: true,
            ..SessionConfig::default()
        };
        let (mut controller, wire) = started(config);
        controller
            .add(&["/work/a", "/work/b", "/work/c"], FileMode::Writable, false)
            .expect("add");

        assert!(controller.stop());
        assert!(!controller.stop());
        assert_eq!(wire.lines(), vec!["/clear"]);
        assert_eq!(*wire.disposed.lock().expect("lock"), 1);
        assert!(controller.is_active());

        assert!(controller.on_process_exited());
        assert_eq!(controller.state(), SessionState::Inactive);
        assert!(controller.store().is_empty());
        assert!(!controller.is_dirty());
        assert!(!controller.on_process_exited());
    }

    #[test]
    fn broken_sink_ends_the_session() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("add");
        *wire.broken.lock().expect("lock") = true;

        let err = controller.sync().expect_err("write fails");
        assert!(matches!(err, SessionError::Sink(_)));
        assert!(!controller.is_active());
        assert!(controller.store().is_empty());
        assert!(!controller.is_dirty());
    }

    #[test]
    fn observer_sees_each_state_change() {
        let (mut controller, _wire) = started(SessionConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.set_observer(Box::new(move |snapshot| {
            sink.lock().expect("lock").push(snapshot.status_line());
        }));

        controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("add");
        controller.add(&["/work/a.ts"], FileMode::Writable, false).expect("no-op");
        controller.sync().expect("sync");
        controller.on_process_exited();

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                "Aider: 1 files (unsynced)".to_string(),
                "Aider: 1 files".to_string(),
                "Aider: Inactive".to_string(),
            ]
        );
    }

    #[test]
    fn list_and_tasks_go_straight_to_the_process() {
        let (mut controller, wire) = started(SessionConfig::default());
        controller.list().expect("list");
        controller
            .run_task(&AiderTask {
                label: "Tests".to_string(),
                description: String::new(),
                command: "/run cargo test".to_string(),
            })
            .expect("task");
        assert_eq!(wire.lines(), vec!["/ls", "/run cargo test"]);
        assert!(!controller.is_dirty());
    }

    #[test]
    fn directory_outside_workspace_is_rejected() {
        let (controller, _wire) = started(SessionConfig::default());
        let err = controller
            .directory_filter(Path::new("/tmp/other"))
            .expect_err("outside");
        assert!(matches!(err, SessionError::OutsideWorkspace { .. }));
    }

    #[test]
    fn parent_components_cannot_leave_the_workspace() {
        let (controller, _wire) = started(SessionConfig::default());
        for dir in ["/work/..", "/work/src/../../etc", "/work/./../work-other"] {
            let err = controller
                .directory_filter(Path::new(dir))
                .expect_err("climbs out");
            assert!(matches!(err, SessionError::OutsideWorkspace { .. }));
        }
        assert!(controller.directory_filter(Path::new("/work/src/../lib")).is_ok());
    }
}
