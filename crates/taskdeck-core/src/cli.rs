use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

/// `ID=STATUS` for `--subtask-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskStatusArg {
    pub id: u64,
    pub status: String,
}

impl std::str::FromStr for SubtaskStatusArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, status) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected SUBTASK_ID=STATUS, got: {s}"))?;
        let id = id
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid subtask id {id:?}: {e}"))?;
        Ok(Self {
            id,
            status: status.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: terminal client for a remote to-do service",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskrc", global = true)]
    pub taskrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account.
    Signup {
        username: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and remember the session.
    Login {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Task table (the default command).
    List(ListArgs),
    /// Task details.
    Show { id: u64 },
    Add(AddArgs),
    Edit(EditArgs),
    /// Delete tasks after confirmation.
    Delete {
        #[arg(required = true)]
        ids: Vec<u64>,
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long = "priority", action = ArgAction::Append)]
    pub priorities: Vec<String>,

    #[arg(long = "status", action = ArgAction::Append)]
    pub statuses: Vec<String>,

    #[arg(long)]
    pub all_priorities: bool,

    #[arg(long)]
    pub all_statuses: bool,

    /// title, due, priority or status.
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long)]
    pub desc: bool,

    #[arg(long = "expand", action = ArgAction::Append)]
    pub expand: Vec<u64>,

    #[arg(long)]
    pub expand_all: bool,
}

/// Fields shared by `add` and `edit`.
#[derive(Args, Debug, Clone, Default)]
pub struct TaskFieldArgs {
    #[arg(long)]
    pub title: Option<String>,

    /// YYYY-MM-DD, MM/DD/YYYY, today, tomorrow, a weekday or +3d.
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub details: Option<String>,

    #[arg(long)]
    pub created: Option<String>,

    /// Image file to attach (metadata only).
    #[arg(long = "attach", action = ArgAction::Append)]
    pub attach: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    #[command(flatten)]
    pub fields: TaskFieldArgs,

    #[arg(long = "subtask", action = ArgAction::Append)]
    pub subtasks: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: u64,

    #[command(flatten)]
    pub fields: TaskFieldArgs,

    #[arg(long = "add-subtask", action = ArgAction::Append)]
    pub add_subtasks: Vec<String>,

    #[arg(long = "remove-subtask", action = ArgAction::Append)]
    pub remove_subtasks: Vec<u64>,

    #[arg(
        long = "subtask-status",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SubtaskStatusArg>()),
        action = ArgAction::Append
    )]
    pub subtask_statuses: Vec<SubtaskStatusArg>,

    /// Attachment name to drop.
    #[arg(long = "detach", action = ArgAction::Append)]
    pub detach: Vec<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pull positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let parsed = arg.to_str().and_then(|s| {
            let rest = s.strip_prefix("rc.")?;
            rest.split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
        });
        match parsed {
            Some((k, v)) => {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
            }
            None => cleaned.push(arg),
        }
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
