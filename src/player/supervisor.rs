use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use super::command::PATH_PLACEHOLDER;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start player: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Verdict for one player-process exit.
#[derive(Debug, Clone, Copy)]
pub struct ExitReport {
    /// The process ran long enough to look like a real playback.
    pub acceptable: bool,
    /// The fast-exit streak crossed the configured cap; auto-playback
    /// should be halted.
    pub halt_playback: bool,
}

/// Owns the external render process: spawn, non-blocking exit polling with
/// the fast-exit heuristic, and graceful-then-forced termination. At most
/// one child is alive at a time.
#[derive(Debug)]
pub struct PlayerSupervisor {
    cmdline: Vec<String>,
    output_log: Option<PathBuf>,
    child: Option<Child>,
    started_at: Option<Instant>,
    fail_count: u32,
    min_accepted_play_time: Duration,
    max_unsuccessful_plays: u32,
    kill_timeout: Duration,
}

impl PlayerSupervisor {
    pub fn new(
        cmdline: Vec<String>,
        output_log: Option<PathBuf>,
        min_accepted_play_time: Duration,
        max_unsuccessful_plays: u32,
    ) -> Self {
        Self {
            cmdline,
            output_log,
            child: None,
            started_at: None,
            fail_count: 0,
            min_accepted_play_time,
            max_unsuccessful_plays,
            kill_timeout: Duration::from_secs(2),
        }
    }

    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }

    pub fn elapsed_since_start(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    pub fn clear_start(&mut self) {
        self.started_at = None;
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    /// Spawn the player for one media file, substituting the path into the
    /// command template. Stdin is discarded; stdout/stderr go to the player
    /// log when one is configured, otherwise they are discarded too.
    pub fn launch(&mut self, media_path: &Path) -> Result<(), LaunchError> {
        let path = media_path.to_string_lossy();
        let argv: Vec<String> = self
            .cmdline
            .iter()
            .map(|tok| {
                if tok == PATH_PLACEHOLDER {
                    path.to_string()
                } else {
                    tok.clone()
                }
            })
            .collect();
        let pretty = pretty_cmdline(&argv);
        info!("+ {pretty}");

        let (out, err) = self.output_sinks();
        let spawned = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(out)
            .stderr(err)
            .spawn();

        match spawned {
            Ok(child) => {
                self.child = Some(child);
                self.started_at = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                error!("failed to start player - {e}");
                error!("failed command line was: {pretty}");
                Err(e.into())
            }
        }
    }

    fn output_sinks(&self) -> (Stdio, Stdio) {
        if let Some(log_path) = &self.output_log {
            let opened = OpenOptions::new().create(true).append(true).open(log_path);
            if let Ok(file) = opened {
                if let Ok(clone) = file.try_clone() {
                    return (Stdio::from(file), Stdio::from(clone));
                }
            }
            warn!("cannot append player output to {}", log_path.display());
        }
        (Stdio::null(), Stdio::null())
    }

    /// Non-blocking exit check. On exit the run is classified against the
    /// minimum accepted play time, the failure streak updated, and the child
    /// handle dropped. `None` while still running.
    pub fn poll(&mut self) -> Option<ExitReport> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(None) => None,
            Ok(Some(_status)) => {
                info!("player executable stopped");
                let acceptable = self
                    .started_at
                    .map_or(true, |t| t.elapsed() > self.min_accepted_play_time);
                let mut halt_playback = false;
                if acceptable {
                    self.fail_count = 0;
                } else {
                    self.fail_count += 1;
                    warn!(
                        "player exited suspiciously quickly ({} in a row)",
                        self.fail_count
                    );
                    if self.fail_count >= self.max_unsuccessful_plays {
                        warn!("playback failed suspiciously often, stopping");
                        halt_playback = true;
                    }
                }
                self.child = None;
                Some(ExitReport {
                    acceptable,
                    halt_playback,
                })
            }
            Err(e) => {
                warn!("could not poll player process: {e}");
                None
            }
        }
    }

    /// Request graceful termination, then wait up to the kill timeout for
    /// the process to go away. The omxplayer shell wrapper needs its
    /// background binary signalled by name; the direct signal is only sent
    /// when that fails. A timeout is logged and tolerated, never waited out
    /// indefinitely.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!("killing player executable");
        let deadline = Instant::now() + self.kill_timeout;

        let mut send_direct = true;
        if self.cmdline[0].contains("omxplayer") && !self.cmdline[0].contains("omxplayer.bin") {
            let killed = Command::new("killall")
                .args(["-2", "omxplayer.bin"])
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            send_direct = !killed;
        }
        if send_direct {
            interrupt(&mut child);
        }

        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) | Err(_) => {
                    if Instant::now() > deadline {
                        error!("failed to kill player");
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    // SIGINT, like a ^C on the player's terminal; players clean up their
    // framebuffer/terminal state on it where SIGKILL would not let them.
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.kill();
}

fn pretty_cmdline(argv: &[String]) -> String {
    argv.iter()
        .map(|a| {
            if a.contains(' ') {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
