//! Command-line surface for operating game servers.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use gameserver_config::defaults::{
    DEFAULT_LOG_LINES, DEFAULT_PATCHELF_PROGRAM, DEFAULT_SETTLE_DELAY_SECS,
    DEFAULT_STEAMCMD_PROGRAM,
};
use gameserver_config::{HostSettings, load_all};
use gameserver_core::{ActionPlanner, error_chain};
use gameserver_host::{SteamCmdDownloader, SystemdSupervisor};
use gameserver_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging, invocation_span};
use tracing::{Instrument, debug, warn};

use crate::commands::{inspect, lifecycle, logs};
use crate::context::{AppContext, CliError, CliResult, Collaborators, PortSource};
use crate::prompt::{AssumeYes, TerminalConfirm};

/// Parses CLI arguments, executes the requested command, and reports failures on stderr.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.into(),
    };
    if let Err(err) = init_logging(&logging) {
        return report(&CliError::validation(format!("{err:#}")));
    }

    let settings = match host_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => return report(&err),
    };
    let collaborators = Collaborators {
        supervisor: Arc::new(SystemdSupervisor::new(settings.use_sudo)),
        downloader: Arc::new(SteamCmdDownloader::new(settings.steamcmd_program.clone())),
        confirmer: if cli.yes {
            Box::new(AssumeYes)
        } else {
            Box::new(TerminalConfirm)
        },
        ports: PortSource::Probe,
    };

    let span = invocation_span(cli.command.label());
    let mut stdout = io::stdout();
    match execute(cli, settings, collaborators, &mut stdout)
        .instrument(span)
        .await
    {
        Ok(()) => 0,
        Err(err) => report(&err),
    }
}

fn report(err: &CliError) -> i32 {
    eprintln!("error: {}", err.display_message());
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
    err.exit_code()
}

/// Assemble host settings from flags, environment fallbacks, and the invoking user's home.
pub(crate) fn host_settings(cli: &Cli) -> CliResult<HostSettings> {
    let home_dir = match &cli.home_dir {
        Some(home) => home.clone(),
        None => BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| {
                CliError::validation("cannot determine the home directory; pass --home-dir")
            })?,
    };
    if !home_dir.is_absolute() {
        return Err(CliError::validation(format!(
            "home directory must be absolute: {}",
            home_dir.display()
        )));
    }

    let mut settings = HostSettings::for_home(home_dir)
        .with_settle_delay(Duration::from_secs(cli.settle_secs));
    if let Some(registry_dir) = &cli.registry_dir {
        settings = settings.with_registry_dir(registry_dir.clone());
    }
    settings.use_sudo = !cli.no_sudo;
    settings.steamcmd_program.clone_from(&cli.steamcmd);
    settings.interpreter_fixup = !cli.no_interpreter_fixup;
    settings.patchelf_program.clone_from(&cli.patchelf);
    settings.dynamic_loader.clone_from(&cli.dynamic_loader);
    Ok(settings)
}

/// Load the registry and run one command against it.
pub(crate) async fn execute(
    cli: Cli,
    settings: HostSettings,
    collaborators: Collaborators,
    out: &mut dyn Write,
) -> CliResult<()> {
    let Collaborators {
        supervisor,
        downloader,
        mut confirmer,
        ports,
    } = collaborators;

    debug!(registry = %settings.registry_dir().display(), "loading registry");
    let load = load_all(settings.registry_dir()).map_err(CliError::Registry)?;
    let ctx = AppContext {
        planner: ActionPlanner::new(supervisor, downloader, settings),
        registry: load.registry,
        load_errors: load.errors,
        ports,
        output: cli.output,
    };

    if !cli.command.renders_load_errors() {
        for err in &ctx.load_errors {
            let message = error_chain(err);
            warn!(error = %message, "descriptor skipped");
            eprintln!("warning: {message}");
        }
    }

    match cli.command {
        Command::Status => inspect::handle_status(&ctx, out).await,
        Command::List => inspect::handle_list(&ctx, out),
        Command::Info(args) => inspect::handle_info(&ctx, &args.id, out).await,
        Command::Network => inspect::handle_network(&ctx, out).await,
        Command::Disk => inspect::handle_disk(&ctx, out),
        Command::Update(args) => lifecycle::handle_update(&ctx, &args.id, args.force, out).await,
        Command::Start(args) => lifecycle::handle_start(&ctx, &args.id, out).await,
        Command::Stop(args) => lifecycle::handle_stop(&ctx, &args.id, out).await,
        Command::Restart(args) => lifecycle::handle_restart(&ctx, &args.id, out).await,
        Command::Clean(args) => {
            lifecycle::handle_clean(&ctx, &args.id, args.includes_user_data(), confirmer.as_mut(), out)
                .await
        }
        Command::Logs(args) => logs::handle_logs(&ctx, &args, out).await,
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gameserver",
    version,
    about = "Install, run, and inspect game servers declared in a descriptor registry"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_REGISTRY_DIR",
        help = "Directory of descriptor files (defaults to $HOME/services)"
    )]
    pub(crate) registry_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_HOME",
        help = "Home directory used for ~ expansion and the default registry"
    )]
    pub(crate) home_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_SETTLE_SECS",
        default_value_t = DEFAULT_SETTLE_DELAY_SECS,
        help = "Seconds to wait between stop and start during restart"
    )]
    pub(crate) settle_secs: u64,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_NO_SUDO",
        help = "Run systemctl, systemd-run, and journalctl without sudo"
    )]
    pub(crate) no_sudo: bool,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_STEAMCMD",
        default_value = DEFAULT_STEAMCMD_PROGRAM,
        help = "Content downloader program"
    )]
    pub(crate) steamcmd: PathBuf,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_NO_INTERPRETER_FIXUP",
        help = "Skip patching the ELF interpreter of downloaded executables"
    )]
    pub(crate) no_interpreter_fixup: bool,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_PATCHELF",
        default_value = DEFAULT_PATCHELF_PROGRAM,
        help = "Program used to patch the ELF interpreter"
    )]
    pub(crate) patchelf: PathBuf,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_DYNAMIC_LOADER",
        help = "Dynamic loader patched executables point at (discovered when omitted)"
    )]
    pub(crate) dynamic_loader: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log filter when RUST_LOG is unset"
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "GAMESERVER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormatArg::Plain
    )]
    pub(crate) log_format: LogFormatArg,
    #[arg(
        short = 'y',
        long,
        global = true,
        help = "Answer yes to every confirmation prompt"
    )]
    pub(crate) yes: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Supervisor and download state of every game.
    Status,
    /// Declared games and their content references.
    List,
    /// Everything known about one game.
    Info(GameArgs),
    /// Fetch or refresh a game's content.
    Update(UpdateArgs),
    /// Launch a game as a transient unit.
    Start(GameArgs),
    /// Stop a game's unit.
    Stop(GameArgs),
    /// Stop, settle, and start a game.
    Restart(GameArgs),
    /// Remove a game's install directory and optionally its user data.
    Clean(CleanArgs),
    /// Show a game's journal.
    Logs(LogsArgs),
    /// Declared port states and listening ports in the game range.
    Network,
    /// Disk usage of every install directory.
    Disk,
}

impl Command {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::List => "list",
            Self::Info(_) => "info",
            Self::Update(_) => "update",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Restart(_) => "restart",
            Self::Clean(_) => "clean",
            Self::Logs(_) => "logs",
            Self::Network => "network",
            Self::Disk => "disk",
        }
    }

    const fn renders_load_errors(&self) -> bool {
        matches!(self, Self::Status | Self::List)
    }
}

#[derive(Debug, Args)]
pub(crate) struct GameArgs {
    #[arg(help = "Game identifier")]
    pub(crate) id: String,
}

#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    #[arg(help = "Game identifier")]
    pub(crate) id: String,
    #[arg(long, help = "Fetch even when the recorded content is current")]
    pub(crate) force: bool,
}

#[derive(Debug, Args)]
pub(crate) struct CleanArgs {
    #[arg(help = "Game identifier")]
    pub(crate) id: String,
    #[arg(long, help = "Also remove the declared user data paths")]
    pub(crate) user_data: bool,
    #[arg(long, help = "Remove game files and user data")]
    pub(crate) all: bool,
}

impl CleanArgs {
    pub(crate) const fn includes_user_data(&self) -> bool {
        self.user_data || self.all
    }
}

#[derive(Debug, Args)]
pub(crate) struct LogsArgs {
    #[arg(help = "Game identifier")]
    pub(crate) id: String,
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_LOG_LINES,
        help = "Number of trailing journal lines"
    )]
    pub(crate) lines: u32,
    #[arg(short = 'f', long, help = "Keep streaming new lines")]
    pub(crate) follow: bool,
    #[arg(long, help = "Only lines newer than this journal time expression")]
    pub(crate) since: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    #[default]
    Plain,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Plain => Self::Plain,
            LogFormatArg::Json => Self::Json,
        }
    }
}
