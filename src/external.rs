//! A media element backed by an external video player process.
//!
//! The player (mpv by default) is spawned with the current source URL and
//! handles HLS itself, so controllers driving it run without an adaptive
//! backend. A clean exit is reported as end of stream.

use log::{debug, info};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::backend::MediaElement;
use crate::error::{PlayerError, Result};
use crate::events::{EventSender, MediaEvent};

/// Search for an executable in the system PATH.
///
/// Absolute paths and paths containing a separator are checked directly.
pub fn find_in_path<P: AsRef<Path>>(exe_name: P) -> Option<PathBuf> {
    let exe_path = exe_name.as_ref();

    if exe_path.is_absolute()
        || exe_path
            .to_string_lossy()
            .contains(std::path::MAIN_SEPARATOR)
    {
        return exe_path.is_file().then(|| exe_path.to_path_buf());
    }

    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            let full_path = dir.join(exe_path);
            if full_path.is_file() {
                return Some(full_path);
            }

            #[cfg(windows)]
            {
                let with_exe = full_path.with_extension("exe");
                if with_exe.is_file() {
                    return Some(with_exe);
                }
            }

            None
        })
    })
}

/// Get the default video player for the current operating system.
pub fn default_player() -> Result<&'static str> {
    match std::env::consts::OS {
        "linux" => Ok("mpv"),
        "windows" => Ok("mpv.exe"),
        "macos" => Ok("iina"),
        other => Err(PlayerError::Player(format!(
            "OS '{}' has no default player, set one in the config",
            other
        ))),
    }
}

struct RunningPlayer {
    stop: oneshot::Sender<()>,
    alive: Arc<AtomicBool>,
}

/// [`MediaElement`] that plays each source in a spawned player process.
pub struct ExternalPlayer {
    program: PathBuf,
    args: Vec<String>,
    events: EventSender,
    source: Option<String>,
    volume: f64,
    fullscreen: bool,
    start_at: Option<f64>,
    running: Option<RunningPlayer>,
}

impl ExternalPlayer {
    /// Resolve `player` (or the platform default) on PATH.
    pub fn new(player: Option<&str>, args: Vec<String>, events: EventSender) -> Result<Self> {
        let name = match player {
            Some(name) => name,
            None => default_player()?,
        };
        let program = find_in_path(name)
            .ok_or_else(|| PlayerError::Player(format!("'{}' not found in PATH", name)))?;
        debug!("Using player {}", program.display());

        Ok(Self::with_program(program, args, events))
    }

    /// Use `program` as-is, without a PATH lookup.
    pub fn with_program(program: PathBuf, args: Vec<String>, events: EventSender) -> Self {
        Self {
            program,
            args,
            events,
            source: None,
            volume: 1.0,
            fullscreen: false,
            start_at: None,
            running: None,
        }
    }

    fn is_mpv(&self) -> bool {
        self.program
            .file_stem()
            .map(|stem| stem.eq_ignore_ascii_case("mpv"))
            .unwrap_or(false)
    }

    /// Arguments for launching the player on `url`.
    ///
    /// Volume, fullscreen and start position are only understood by mpv.
    fn launch_args(&self, url: &str) -> Vec<String> {
        let mut args = self.args.clone();
        if self.is_mpv() {
            args.push(format!("--volume={}", (self.volume * 100.0).round()));
            if self.fullscreen {
                args.push("--fs".to_string());
            }
            if let Some(start) = self.start_at.filter(|s| *s > 0.0) {
                args.push(format!("--start={:.1}", start));
            }
        }
        args.push(url.to_string());
        args
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            debug!("Stopping player process");
            let _ = running.stop.send(());
        }
    }
}

impl MediaElement for ExternalPlayer {
    fn set_source(&mut self, url: &str) {
        self.stop();
        self.source = Some(url.to_string());
        self.start_at = None;
    }

    fn clear_source(&mut self) {
        self.stop();
        self.source = None;
    }

    fn play(&mut self) -> Result<()> {
        if !self.is_paused() {
            return Ok(());
        }
        let url = self
            .source
            .clone()
            .ok_or_else(|| PlayerError::Player("no source loaded".to_string()))?;

        let mut child = Command::new(&self.program)
            .args(self.launch_args(&url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlayerError::Player(format!("failed to start {}: {}", self.program.display(), e))
            })?;
        info!("Playing {}", url);
        self.start_at = None;

        let (stop_tx, stop_rx) = oneshot::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let events = self.events.clone();
        let watcher_alive = Arc::clone(&alive);

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    watcher_alive.store(false, Ordering::SeqCst);
                    match status {
                        Ok(status) if status.success() => {
                            events.media(MediaEvent::Ended);
                        }
                        Ok(status) => {
                            debug!("Player exited with {}", status);
                            events.media(MediaEvent::Pause);
                        }
                        Err(e) => {
                            events.media(MediaEvent::Error { message: e.to_string() });
                        }
                    }
                }
                _ = stop_rx => {
                    let _ = child.kill().await;
                    watcher_alive.store(false, Ordering::SeqCst);
                }
            }
        });

        self.running = Some(RunningPlayer {
            stop: stop_tx,
            alive,
        });
        Ok(())
    }

    /// Stops the player process; it cannot be suspended from outside.
    fn pause(&mut self) {
        self.stop();
    }

    fn is_paused(&self) -> bool {
        !self
            .running
            .as_ref()
            .map(|r| r.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        debug!("Volume {:.2} applies from the next launch", volume);
    }

    fn seek(&mut self, seconds: f64) {
        self.start_at = Some(seconds);
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.fullscreen = false;
        Ok(())
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
