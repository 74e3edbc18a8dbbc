#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
	Start,
	Stop,
	Add(Vec<String>),
	Read(Vec<String>),
	Drop(String),
	Clear,
	Dir(String),
	Sync,
	List,
	Open(String),
	Close(String),
	Tasks,
	TasksInit,
	Task(usize),
	Status,
	Help,
	Quit,
	/// Anything not prefixed with `:` goes to aider untouched.
	Forward(String),
}

pub const HELP: &str = "\
:start                 start the aider session
:stop                  stop the session
:add <paths..>         track files as editable
:read <paths..>        track files as read-only
:drop <path>           stop tracking a file
:clear                 stage removal of every file
:dir <path>            track every non-ignored file under a directory
:sync                  push the working set to aider
:ls                    ask aider to list its context
:open <path>           report a file focused in the editor
:close <path>          report a file closed in the editor
:tasks [init]          list project tasks, or create the task file
:task <n>              run task n
:status                show the working set
:quit                  stop and exit
other text             sent to aider as-is";

pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
	let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
	if trimmed.trim().is_empty() {
		return Ok(None);
	}
	let Some(body) = trimmed.trim_start().strip_prefix(':') else {
		return Ok(Some(ShellCommand::Forward(trimmed.to_string())));
	};

	let mut args = split_args(body)?;
	if args.is_empty() {
		return Err("empty command".to_string());
	}
	let name = args.remove(0).to_lowercase();
	let command = match name.as_str() {
		"start" => ShellCommand::Start,
		"stop" => ShellCommand::Stop,
		"add" => ShellCommand::Add(require_some(&name, args)?),
		"read" => ShellCommand::Read(require_some(&name, args)?),
		"drop" => ShellCommand::Drop(require_one(&name, args)?),
		"clear" => ShellCommand::Clear,
		"dir" => ShellCommand::Dir(require_one(&name, args)?),
		"sync" => ShellCommand::Sync,
		"ls" => ShellCommand::List,
		"open" => ShellCommand::Open(require_one(&name, args)?),
		"close" => ShellCommand::Close(require_one(&name, args)?),
		"tasks" => match args.first().map(String::as_str) {
			None => ShellCommand::Tasks,
			Some("init") => ShellCommand::TasksInit,
			Some(other) => return Err(format!("unknown tasks action: {other}")),
		},
		"task" => {
			let raw = require_one(&name, args)?;
			let index = raw
				.parse::<usize>()
				.ok()
				.filter(|index| *index > 0)
				.ok_or_else(|| format!("task number must be a positive integer, got {raw}"))?;
			ShellCommand::Task(index)
		}
		"status" => ShellCommand::Status,
		"help" | "h" | "?" => ShellCommand::Help,
		"quit" | "q" | "exit" => ShellCommand::Quit,
		other => return Err(format!("unknown command :{other} (try :help)")),
	};
	Ok(Some(command))
}

fn require_some(name: &str, args: Vec<String>) -> Result<Vec<String>, String> {
	if args.is_empty() {
		return Err(format!(":{name} needs at least one path"));
	}
	Ok(args)
}

fn require_one(name: &str, mut args: Vec<String>) -> Result<String, String> {
	if args.len() != 1 {
		return Err(format!(":{name} takes exactly one argument"));
	}
	Ok(args.remove(0))
}

/// Whitespace split honouring single and double quotes.
fn split_args(input: &str) -> Result<Vec<String>, String> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut quote: Option<char> = None;
	let mut pending = false;

	for ch in input.chars() {
		match quote {
			Some(q) if ch == q => quote = None,
			Some(_) => current.push(ch),
			None if ch == '"' || ch == '\'' => {
				quote = Some(ch);
				pending = true;
			}
			None if ch.is_whitespace() => {
				if pending || !current.is_empty() {
					args.push(std::mem::take(&mut current));
					pending = false;
				}
			}
			None => current.push(ch),
		}
	}
	if quote.is_some() {
		return Err("unterminated quote".to_string());
	}
	if pending || !current.is_empty() {
		args.push(current);
	}
	Ok(args)
}
