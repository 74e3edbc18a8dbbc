use std::io;
use std::path::PathBuf;

/// What the controller asks the host to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub cwd: PathBuf,
    /// Name of the terminal/pane the host should present the process in.
    pub title: String,
}

/// The assistant's command stream. Lines are delivered in order.
pub trait ProcessSink: Send {
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Bring the process to the foreground. Hosts without a notion of focus
    /// can leave this as a no-op.
    fn show(&mut self) {}

    /// Release the process. Termination is reported back through
    /// `SessionController::on_process_exited`.
    fn dispose(&mut self);
}

/// Creates the terminal/process the invocation line is typed into.
pub trait ProcessLauncher: Send {
    fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessSink>>;
}
