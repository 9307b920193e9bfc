//! handpoint - hand-gesture pointer control
//!
//! Reads hand keypoint frames from a landmark detector and turns them into
//! cursor moves, clicks, scrolls and launch-button activations.

mod config;
mod effector;
mod pipeline;
mod source;
mod supervisor;
mod tracking;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use config::{Config, Overrides};
use effector::{Dispatcher, Effector, OsEffector, SexpEffector};
use pipeline::MenuOutcome;
use source::{DetectorProcess, FrameSource, JsonLinesSource};
use supervisor::{RestartPolicy, WorkerSpec};

#[derive(Parser, Debug)]
#[command(name = "handpoint", version, about = "Hand-gesture pointer control")]
struct Cli {
    /// Config file (s-expression plist)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the pointer: cursor, click, right-click, scroll
    Pointer(PipelineArgs),
    /// Show the launch button until it is pinched or 'q' is pressed
    Menu(PipelineArgs),
    /// Menu first, then supervise the pointer pipeline and extra workers
    Launch {
        #[command(flatten)]
        pipeline: PipelineArgs,
        #[command(flatten)]
        workers: WorkerArgs,
    },
    /// Keep a set of worker commands running
    Supervise(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Detector command printing JSON frames (default: read frames from stdin)
    #[arg(long)]
    detector: Option<String>,

    /// Where action events go
    #[arg(long, value_enum, default_value_t = EffectorKind::Sexp)]
    effector: EffectorKind,

    /// Screen size as WxH (default: from the OS effector or the config)
    #[arg(long, value_parser = config::parse_screen)]
    screen: Option<(u32, u32)>,

    /// Exchange primary and secondary hand roles
    #[arg(long)]
    swap_roles: bool,
}

#[derive(Args, Debug, Clone)]
struct WorkerArgs {
    /// Extra worker as NAME=COMMAND (repeatable)
    #[arg(long = "worker", value_parser = WorkerSpec::parse)]
    workers: Vec<WorkerSpec>,

    /// Give up on a worker after this many restarts (default: never)
    #[arg(long)]
    max_restarts: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EffectorKind {
    /// S-expression event stream on stdout
    Sexp,
    /// OS pointer injection
    Os,
}

impl EffectorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Sexp => "sexp",
            Self::Os => "os",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handpoint=info".into()),
        )
        .init();

    info!("handpoint v{} starting", env!("CARGO_PKG_VERSION"));
    pipeline::install_signal_handlers();

    match cli.command {
        Command::Pointer(args) => {
            let (config, mut source, mut dispatcher) = prepare(cli.config.as_deref(), &args)?;
            pipeline::pointer::run(&mut source, &mut dispatcher, &config)?;
            Ok(())
        }
        Command::Menu(args) => {
            let (config, mut source, mut dispatcher) = prepare(cli.config.as_deref(), &args)?;
            let outcome = pipeline::menu::run(&mut source, &mut dispatcher, &config)?;
            println!("(:type :menu :outcome :{})", outcome.as_str());
            Ok(())
        }
        Command::Launch { pipeline: args, workers } => {
            if args.detector.is_none() {
                anyhow::bail!("launch needs --detector: the pointer pipeline runs as its own process");
            }
            let outcome = {
                let (config, mut source, mut dispatcher) =
                    prepare(cli.config.as_deref(), &args)?;
                pipeline::menu::run(&mut source, &mut dispatcher, &config)?
            };
            if outcome == MenuOutcome::Closed {
                info!("menu closed, nothing to launch");
                return Ok(());
            }

            let mut specs = vec![pointer_worker(cli.config.as_deref(), &args)?];
            specs.extend(workers.workers);
            supervisor::run(specs, restart_policy(workers.max_restarts))
        }
        Command::Supervise(workers) => {
            supervisor::run(workers.workers, restart_policy(workers.max_restarts))
        }
    }
}

/// Load config, open the frame source and the effector for one pipeline.
fn prepare(
    config_path: Option<&std::path::Path>,
    args: &PipelineArgs,
) -> anyhow::Result<(Config, Box<dyn FrameSource>, Dispatcher<Box<dyn Effector>>)> {
    let mut config = Config::load(config_path)?;
    config.apply(&Overrides {
        screen: args.screen,
        swap_roles: args.swap_roles,
    });

    let effector: Box<dyn Effector> = match args.effector {
        EffectorKind::Sexp => Box::new(SexpEffector::stdout()),
        EffectorKind::Os => Box::new(OsEffector::new()?),
    };
    if args.screen.is_none() {
        if let Some((w, h)) = effector.display_size() {
            config.cursor.screen_width = w;
            config.cursor.screen_height = h;
        }
    }
    config.validate().context("invalid configuration")?;
    info!("config: {}", config.config_sexp());

    let source: Box<dyn FrameSource> = match &args.detector {
        Some(command) => Box::new(DetectorProcess::from_command_line(command)?),
        None => {
            info!("reading detector frames from stdin");
            Box::new(JsonLinesSource::stdin())
        }
    };

    Ok((config, source, Dispatcher::new(effector)))
}

/// This binary's `pointer` command with the same settings, as a worker.
fn pointer_worker(
    config_path: Option<&std::path::Path>,
    args: &PipelineArgs,
) -> anyhow::Result<WorkerSpec> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let mut argv = Vec::new();
    if let Some(path) = config_path {
        argv.push("--config".to_string());
        argv.push(path.display().to_string());
    }
    argv.push("pointer".to_string());
    if let Some(detector) = &args.detector {
        argv.push("--detector".to_string());
        argv.push(detector.clone());
    }
    argv.push("--effector".to_string());
    argv.push(args.effector.as_str().to_string());
    if let Some((w, h)) = args.screen {
        argv.push("--screen".to_string());
        argv.push(format!("{}x{}", w, h));
    }
    if args.swap_roles {
        argv.push("--swap-roles".to_string());
    }
    Ok(WorkerSpec::new("pointer", exe.display().to_string(), argv))
}

fn restart_policy(max_restarts: Option<u32>) -> RestartPolicy {
    RestartPolicy {
        max_restarts,
        ..RestartPolicy::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_pointer() {
        let cli = Cli::try_parse_from([
            "handpoint", "--config", "hp.el", "pointer", "--screen", "1280x720", "--swap-roles",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hp.el")));
        let Command::Pointer(args) = cli.command else {
            panic!("expected pointer command");
        };
        assert_eq!(args.screen, Some((1280, 720)));
        assert!(args.swap_roles);
        assert_eq!(args.effector, EffectorKind::Sexp);
        assert!(args.detector.is_none());
    }

    #[test]
    fn test_cli_parses_workers() {
        let cli = Cli::try_parse_from([
            "handpoint",
            "supervise",
            "--worker",
            "voice=python3 voice.py",
            "--worker",
            "clock=sleep 60",
            "--max-restarts",
            "3",
        ])
        .unwrap();
        let Command::Supervise(workers) = cli.command else {
            panic!("expected supervise command");
        };
        assert_eq!(workers.workers.len(), 2);
        assert_eq!(workers.workers[0].name, "voice");
        assert_eq!(workers.max_restarts, Some(3));
    }

    #[test]
    fn test_cli_rejects_bad_screen() {
        assert!(Cli::try_parse_from(["handpoint", "pointer", "--screen", "big"]).is_err());
    }

    #[test]
    fn test_pointer_worker_forwards_flags() {
        let args = PipelineArgs {
            detector: Some("detect --camera 0".to_string()),
            effector: EffectorKind::Os,
            screen: Some((800, 600)),
            swap_roles: true,
        };
        let spec = pointer_worker(Some(std::path::Path::new("hp.el")), &args).unwrap();
        assert_eq!(spec.name, "pointer");
        assert_eq!(
            spec.args,
            vec![
                "--config", "hp.el", "pointer", "--detector", "detect --camera 0", "--effector",
                "os", "--screen", "800x600", "--swap-roles",
            ]
        );
    }
}
