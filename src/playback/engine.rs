/// Audio output behind a small trait, with a rodio implementation
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// How often the audio thread checks for a drained sink
const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("cannot play {path}: {reason}")]
    Playback { path: PathBuf, reason: String },
}

/// Notifications coming back from the audio device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The current file played to its end
    Finished,
    Failed(String),
}

/// Position within the loaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub position: Duration,
    /// `None` when the decoder cannot tell the length up front
    pub duration: Option<Duration>,
}

/// The audio device as the controller sees it
pub trait PlaybackEngine: Send + Sync {
    fn play(&self, path: &Path) -> Result<(), EngineError>;
    fn pause(&self) -> Result<(), EngineError>;
    fn resume(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
    fn seek(&self, position: Duration) -> Result<(), EngineError>;
    /// Volume in percent, `0..=100`
    fn set_volume(&self, volume: u8) -> Result<(), EngineError>;
    /// `None` while nothing is loaded
    fn progress(&self) -> Option<Progress>;
}

enum AudioCmd {
    Play(PathBuf),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    Volume(f32),
}

/// rodio output owned by a dedicated thread
pub struct RodioEngine {
    tx: std_mpsc::Sender<AudioCmd>,
    progress: Arc<Mutex<Option<Progress>>>,
}

impl RodioEngine {
    /// Start the audio thread.
    ///
    /// Natural end of a file is reported as [`EngineEvent::Finished`].
    pub fn spawn() -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError> {
        let (tx, rx) = std_mpsc::channel::<AudioCmd>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), EngineError>>();
        let progress = Arc::new(Mutex::new(None));
        let shared_progress = progress.clone();

        thread::Builder::new()
            .name("yaplayer-audio".to_string())
            .spawn(move || {
                // The output stream must live on this thread
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(EngineError::Unavailable(e.to_string())));
                        return;
                    }
                };

                let mut sink: Option<Sink> = None;
                let mut duration: Option<Duration> = None;
                let mut volume = 1.0_f32;
                let mut awaiting_finish = false;

                loop {
                    match rx.recv_timeout(FINISH_POLL_INTERVAL) {
                        Ok(AudioCmd::Play(path)) => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            match open_sink(&handle, &path, volume) {
                                Ok((new_sink, total)) => {
                                    tracing::info!("Playing {}", path.display());
                                    sink = Some(new_sink);
                                    duration = total;
                                    awaiting_finish = true;
                                }
                                Err(reason) => {
                                    tracing::error!("Audio playback error: {}", reason);
                                    duration = None;
                                    awaiting_finish = false;
                                    let _ = event_tx.send(EngineEvent::Failed(reason));
                                }
                            }
                        }
                        Ok(AudioCmd::Pause) => {
                            if let Some(s) = &sink {
                                s.pause();
                            }
                        }
                        Ok(AudioCmd::Resume) => {
                            if let Some(s) = &sink {
                                s.play();
                            }
                        }
                        Ok(AudioCmd::Stop) => {
                            if let Some(s) = sink.take() {
                                s.stop();
                            }
                            duration = None;
                            awaiting_finish = false;
                        }
                        Ok(AudioCmd::Seek(position)) => {
                            if let Some(s) = &sink {
                                if let Err(e) = s.try_seek(position) {
                                    tracing::warn!("Seek failed: {:?}", e);
                                }
                            }
                        }
                        Ok(AudioCmd::Volume(v)) => {
                            volume = v;
                            if let Some(s) = &sink {
                                s.set_volume(v);
                            }
                        }
                        Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                        Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                    }

                    let current = sink.as_ref().map(|s| Progress {
                        position: s.get_pos(),
                        duration,
                    });
                    if let Ok(mut shared) = shared_progress.lock() {
                        *shared = current;
                    }

                    if awaiting_finish && sink.as_ref().map(Sink::empty).unwrap_or(false) {
                        awaiting_finish = false;
                        tracing::debug!("Track playback completed");
                        if event_tx.send(EngineEvent::Finished).is_err() {
                            break;
                        }
                    }
                }
                tracing::debug!("Audio thread exiting");
            })
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| EngineError::Unavailable(e.to_string()))??;

        Ok((Self { tx, progress }, event_rx))
    }

    fn send(&self, cmd: AudioCmd) -> Result<(), EngineError> {
        self.tx
            .send(cmd)
            .map_err(|_| EngineError::Unavailable("audio thread stopped".to_string()))
    }
}

fn open_sink(
    handle: &rodio::OutputStreamHandle,
    path: &Path,
    volume: f32,
) -> Result<(Sink, Option<Duration>), String> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;
    let total = source.total_duration();
    let sink = Sink::try_new(handle).map_err(|e| format!("Failed to create sink: {}", e))?;
    sink.set_volume(volume);
    sink.append(source);
    Ok((sink, total))
}

impl PlaybackEngine for RodioEngine {
    fn play(&self, path: &Path) -> Result<(), EngineError> {
        if !path.is_file() {
            return Err(EngineError::Playback {
                path: path.to_path_buf(),
                reason: "file is not in the cache".to_string(),
            });
        }
        self.send(AudioCmd::Play(path.to_path_buf()))
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.send(AudioCmd::Pause)
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.send(AudioCmd::Resume)
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.send(AudioCmd::Stop)
    }

    fn seek(&self, position: Duration) -> Result<(), EngineError> {
        self.send(AudioCmd::Seek(position))
    }

    fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        self.send(AudioCmd::Volume(f32::from(volume.min(100)) / 100.0))
    }

    fn progress(&self) -> Option<Progress> {
        self.progress.lock().ok().and_then(|p| *p)
    }
}
