//! dbg - a line-oriented debugger console.
//!
//! Reads commands from standard input, runs them through a session and
//! prints process events between prompts.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dbg_session::{
    Debugger, DebuggerConfig, Event, EventData, EventMask, FileHandle, Listener, ReturnStatus,
    terminal,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dbg")]
#[command(about = "Interactive debugger console", version)]
struct Cli {
    /// Executable to create a target for
    executable: Option<PathBuf>,

    /// Architecture for targets created without one
    #[arg(long)]
    arch: Option<String>,

    /// Platform for the initial target
    #[arg(long)]
    platform: Option<String>,

    /// Do not read init files
    #[arg(long)]
    no_init: bool,

    /// Run commands asynchronously
    #[arg(long = "async")]
    async_mode: bool,

    /// Command to run before the prompt (repeatable)
    #[arg(short = 'o', long = "one-line")]
    commands: Vec<String>,

    /// Log channel to enable, as `channel` or `channel:cat1,cat2` (repeatable)
    #[arg(long = "log")]
    logs: Vec<String>,
}

/// Install the stderr subscriber. Returns false if one was already set.
fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_env("DBG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "tracing subscriber already installed");
            false
        }
    }
}

/// Write the prompt. A console that cannot be written to is logged, not fatal.
fn show_prompt(prompt: &str, out: &mut impl Write) {
    if let Err(e) = out.write_all(prompt.as_bytes()).and_then(|()| out.flush()) {
        debug!(error = %e, "failed to write prompt");
    }
}

fn enable_logs(debugger: &Debugger, specs: &[String]) {
    if specs.is_empty() {
        return;
    }
    debugger.set_logging_callback(|line| eprint!("{line}"));
    for spec in specs {
        let (channel, categories) = spec.split_once(':').unwrap_or((spec.as_str(), ""));
        let categories: Vec<&str> = categories.split(',').filter(|c| !c.is_empty()).collect();
        if !debugger.enable_log(channel, &categories) {
            eprintln!("error: invalid log channel '{spec}'");
        }
    }
}

/// Print pending events. Returns true once a command asked to quit.
fn drain_events(debugger: &Debugger, listener: &Listener) -> bool {
    let out = debugger.output_file_handle();
    let err = debugger.error_file_handle();
    let mut quit = false;
    while let Some(event) = listener.try_next() {
        if let EventData::Command { status, .. } = event.data() {
            quit |= *status == ReturnStatus::Quit;
            continue;
        }
        if event.kind().intersects(EventMask::PROCESS_ALL) {
            report_process_event(debugger, &event, &out, &err);
        }
    }
    quit
}

fn report_process_event(debugger: &Debugger, event: &Event, out: &FileHandle, err: &FileHandle) {
    if let Some(target) = debugger.target_from_event(event) {
        if let Err(e) = debugger.handle_process_event(&target.process(), event, out, err) {
            error!(error = %e, "failed to report process event");
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    Debugger::initialize();
    if let Some(arch) = &cli.arch {
        if !Debugger::set_default_architecture(arch) {
            eprintln!("error: unknown architecture '{arch}'");
            return ExitCode::FAILURE;
        }
    }

    let mut config = DebuggerConfig::from_env().async_mode(cli.async_mode);
    if std::env::var_os("DBG_TERM_WIDTH").is_none() {
        if let Some(cols) = terminal::width() {
            config = config.term_width(cols);
        }
    }
    let mut debugger = Debugger::builder()
        .config(config)
        .source_init_files(!cli.no_init)
        .build();
    if !debugger.is_valid() {
        eprintln!("error: unable to create a debugger session");
        return ExitCode::FAILURE;
    }
    enable_logs(&debugger, &cli.logs);
    let Some(listener) = debugger.listener() else {
        return ExitCode::FAILURE;
    };

    if let Some(exe) = &cli.executable {
        match debugger.create_target(exe, None, cli.platform.as_deref(), true) {
            Ok(target) => println!(
                "Current executable set to '{}' ({}).",
                target.executable().display(),
                target.triple()
            ),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    let mut quit = false;
    for command in &cli.commands {
        quit = debugger.handle_command(command) == ReturnStatus::Quit;
        drain_events(&debugger, &listener);
        if quit {
            break;
        }
    }

    let stdin = io::stdin();
    let mut line = String::new();
    while !quit {
        show_prompt(&debugger.prompt(), &mut io::stdout());
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                debugger.dispatch_input_end_of_file();
                drain_events(&debugger, &listener);
                println!();
                break;
            }
            Ok(_) => {
                debugger.dispatch_input(line.as_bytes());
                quit = drain_events(&debugger, &listener);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debugger.dispatch_input_interrupt();
            }
            Err(e) => {
                error!(error = %e, "failed to read input");
                break;
            }
        }
    }

    info!(targets = debugger.num_targets(), "exiting");
    debugger.destroy();
    Debugger::terminate();
    ExitCode::SUCCESS
}
