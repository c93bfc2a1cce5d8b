// Calliope - folder jukebox
// Point it at a directory full of media, it keeps something playing through
// whatever player the machine has, and your phone picks what comes next

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use calliope::player;
use calliope::queue::{Jukebox, JukeboxOptions};
use calliope::web::{self, WebContext};
use calliope::{Config, MediaScanner, PlayerSupervisor};

#[derive(Debug, Parser)]
#[command(version, about = "Folder jukebox with a web remote and an external player")]
struct Args {
    /// Input directory
    #[arg(value_name = "SRCDIR", default_value = ".")]
    srcdir: PathBuf,

    /// Web interface port
    #[arg(short, long, value_name = "N")]
    port: Option<u16>,

    /// Player to use (and optional parameters); autodetected when omitted
    #[arg(short = 'x', long, value_name = "EXE")]
    player: Option<String>,

    /// Do not run the video player in fullscreen mode
    #[arg(short, long)]
    windowed: bool,

    /// File to save state (history, playlist, play counts) to
    #[arg(short = 'f', long, value_name = "FILE")]
    statefile: Option<PathBuf>,

    /// Save the state file at every played track
    #[arg(short, long)]
    autosave: bool,

    /// Rescan the input directory at every played track
    #[arg(short = 's', long)]
    autoscan: bool,

    /// Start playback immediately on initialization
    #[arg(short = 'r', long)]
    autoplay: bool,

    /// Only preserve history for the last N tracks
    #[arg(short = 'd', long, value_name = "N")]
    maxhist: Option<usize>,

    /// Produce a debug log file; player output lands there too
    #[arg(short, long, value_name = "FILE")]
    logfile: Option<PathBuf>,

    /// Define web requests that cause the program to quit
    #[arg(short, long, value_name = "CMD[=EXITCODE]")]
    quitcmd: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.logfile.as_deref())?;

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("could not load config, using defaults - {e}");
            Config::default()
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(statefile) = args.statefile {
        config.state_file = statefile;
    }
    if args.autosave {
        config.autosave = true;
    }
    if args.autoscan {
        config.autoscan = true;
    }
    if let Some(maxhist) = args.maxhist {
        config.history_depth = maxhist;
    }
    if args.windowed {
        config.fullscreen = false;
    }

    let root = args
        .srcdir
        .canonicalize()
        .with_context(|| format!("input directory {} is not usable", args.srcdir.display()))?;

    let cmdline = player::resolve(args.player.as_deref(), config.fullscreen)
        .with_context(|| {
            format!(
                "could not find a player ({}), use --player to specify one manually",
                player::known_players().join("/")
            )
        })?;

    let quit_commands = args
        .quitcmd
        .iter()
        .map(|spec| parse_quitcmd(spec))
        .collect::<Result<HashMap<String, i32>>>()?;

    let supervisor = PlayerSupervisor::new(
        cmdline,
        args.logfile.clone(),
        Duration::from_secs_f64(config.min_accepted_play_secs),
        config.max_unsuccessful_plays,
    );
    let scanner = MediaScanner::new(&config.extensions);
    let options = JukeboxOptions {
        state_file: config.state_file.clone(),
        autosave: config.autosave,
        autoscan: config.autoscan,
        max_history: config.history_depth,
        min_play_time: Duration::from_secs(config.min_play_secs),
    };
    let jukebox = Arc::new(Mutex::new(Jukebox::new(root, scanner, supervisor, options)));

    info!("scanning for files ...");
    {
        let mut jb = jukebox.lock().unwrap();
        jb.rescan();
        jb.load_state();
        info!("initial scan finished, {} file(s) found", jb.registry().len());
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("can not start web server on port {}", config.port))?;
    let ctx = WebContext {
        jukebox: jukebox.clone(),
        quit_commands: Arc::new(quit_commands),
    };
    tokio::spawn(async move {
        if let Err(e) = web::serve(listener, ctx).await {
            warn!("web server stopped - {e}");
        }
    });

    {
        let mut jb = jukebox.lock().unwrap();
        if args.autoplay {
            jb.play();
        } else {
            jb.render_idle();
        }
    }

    // The poll timer lives on its own thread and takes the same lock as the
    // web handlers, so its effects are atomic like everything else.
    let shutdown = Arc::new(AtomicBool::new(false));
    let poll_jukebox = jukebox.clone();
    let poll_shutdown = shutdown.clone();
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let poll_loop = tokio::task::spawn_blocking(move || loop {
        std::thread::sleep(poll_interval);
        if poll_shutdown.load(Ordering::Relaxed) {
            return 0;
        }
        let mut jb = poll_jukebox.lock().unwrap();
        jb.tick();
        if let Some(code) = jb.exit_code() {
            return code;
        }
    });

    let code = tokio::select! {
        joined = poll_loop => joined.unwrap_or(0),
        _ = tokio::signal::ctrl_c() => {
            info!("aborted by user, shutting down");
            0
        }
    };
    shutdown.store(true, Ordering::Relaxed);

    {
        let mut jb = jukebox.lock().unwrap();
        jb.halt();
        jb.save_state(true);
    }
    info!("calliope exiting");
    drop(_log_guard);
    std::process::exit(code);
}

fn init_tracing(logfile: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match logfile {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

/// `CMD[=EXITCODE]` (or `CMD:EXITCODE`); the code defaults to 0.
fn parse_quitcmd(spec: &str) -> Result<(String, i32)> {
    let normalized = spec.replace(':', "=");
    let (cmd, code) = match normalized.split_once('=') {
        Some((cmd, code)) => (
            cmd,
            code.trim()
                .parse::<i32>()
                .with_context(|| format!("invalid exit code in quit command '{spec}'"))?,
        ),
        None => (normalized.as_str(), 0),
    };
    Ok((cmd.trim().trim_matches('/').to_lowercase(), code))
}
