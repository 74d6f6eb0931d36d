//! Dedicated audio thread that owns the `rodio` output stream.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the stream and the
//! current sink live on one OS thread. [`RodioOutput`] is the `Send + Sync`
//! proxy the coordinator holds: every call becomes an [`OutputCommand`] and
//! the reply comes back on a oneshot channel, so async callers never block
//! the runtime waiting for the device.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use readcast_core::{AudioOutput, AudioOutputError, AudioSource, LoadedMedia, OutputEvent};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 16;

// ── Commands ───────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, AudioOutputError>>;

/// Encoded audio ready for the decoder.
enum Media {
    File(PathBuf),
    Bytes(Vec<u8>),
}

enum OutputCommand {
    Load {
        media: Media,
        reply: Reply<LoadedMedia>,
    },
    Play {
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Seek {
        seconds: f64,
        reply: Reply<()>,
    },
    SetRate {
        rate: f64,
        reply: Reply<()>,
    },
    Position {
        reply: oneshot::Sender<f64>,
    },
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `AudioOutput` on the default device.
pub struct RodioOutput {
    cmd_tx: mpsc::Sender<OutputCommand>,
    events: broadcast::Sender<OutputEvent>,
    http: reqwest::Client,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RodioOutput {
    /// Spawn the audio thread and open the default output device.
    pub fn spawn() -> Result<Self, AudioOutputError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<OutputCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioOutputError>>();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let thread_events = events.clone();
        let thread = thread::Builder::new()
            .name("readcast-audio".into())
            .spawn(move || AudioThread::run(cmd_rx, init_tx, thread_events))
            .map_err(|e| AudioOutputError::Device(format!("failed to spawn audio thread: {e}")))?;

        init_rx
            .recv()
            .map_err(|_| AudioOutputError::Device("audio thread died".to_string()))??;

        Ok(Self {
            cmd_tx,
            events,
            http: reqwest::Client::new(),
            thread: Mutex::new(Some(thread)),
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> OutputCommand,
    ) -> Result<T, AudioOutputError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| AudioOutputError::Device("audio thread died".to_string()))?;
        rx.await
            .map_err(|_| AudioOutputError::Device("audio thread died".to_string()))?
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AudioOutputError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AudioOutputError::Load(format!("{url}: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioOutputError::Load(format!("{url}: {e}")))?;
        debug!(url, bytes = bytes.len(), "Downloaded episode audio");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    async fn load(&self, source: AudioSource) -> Result<LoadedMedia, AudioOutputError> {
        let media = match source {
            AudioSource::File(path) => Media::File(path),
            AudioSource::Url(url) => Media::Bytes(self.download(&url).await?),
        };
        self.request(|reply| OutputCommand::Load { media, reply }).await
    }

    async fn play(&self) -> Result<(), AudioOutputError> {
        self.request(|reply| OutputCommand::Play { reply }).await
    }

    async fn pause(&self) -> Result<(), AudioOutputError> {
        self.request(|reply| OutputCommand::Pause { reply }).await
    }

    async fn stop(&self) -> Result<(), AudioOutputError> {
        self.request(|reply| OutputCommand::Stop { reply }).await
    }

    async fn seek(&self, seconds: f64) -> Result<(), AudioOutputError> {
        self.request(|reply| OutputCommand::Seek { seconds, reply })
            .await
    }

    async fn set_rate(&self, rate: f64) -> Result<(), AudioOutputError> {
        self.request(|reply| OutputCommand::SetRate { rate, reply })
            .await
    }

    async fn position(&self) -> f64 {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(OutputCommand::Position { reply: tx }).is_err() {
            return 0.0;
        }
        rx.await.unwrap_or(0.0)
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        // The thread may already be gone.
        let _ = self.cmd_tx.send(OutputCommand::Shutdown);
        let handle = self
            .thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

// ── Audio thread ───────────────────────────────────────────────────

#[allow(clippy::cast_possible_truncation)]
const fn speed(rate: f64) -> f32 {
    rate as f32
}

struct AudioThread {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Arc<Sink>>,
    generation: u64,
    /// Generation whose natural end should be reported; 0 when none.
    reportable: Arc<AtomicU64>,
    rate: f64,
    events: broadcast::Sender<OutputEvent>,
}

impl AudioThread {
    fn run(
        cmd_rx: mpsc::Receiver<OutputCommand>,
        init_tx: mpsc::Sender<Result<(), AudioOutputError>>,
        events: broadcast::Sender<OutputEvent>,
    ) {
        let (stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(AudioOutputError::Device(e.to_string())));
                return;
            }
        };
        if init_tx.send(Ok(())).is_err() {
            return;
        }
        info!("Audio output opened on the default device");

        let mut audio = Self {
            _stream: stream,
            handle,
            sink: None,
            generation: 0,
            reportable: Arc::new(AtomicU64::new(0)),
            rate: 1.0,
            events,
        };

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                OutputCommand::Load { media, reply } => {
                    let _ = reply.send(audio.load(media));
                }
                OutputCommand::Play { reply } => {
                    let _ = reply.send(audio.with_sink(|sink| sink.play()));
                }
                OutputCommand::Pause { reply } => {
                    let _ = reply.send(audio.with_sink(|sink| sink.pause()));
                }
                OutputCommand::Stop { reply } => {
                    audio.unload();
                    let _ = reply.send(Ok(()));
                }
                OutputCommand::Seek { seconds, reply } => {
                    let _ = reply.send(audio.seek(seconds));
                }
                OutputCommand::SetRate { rate, reply } => {
                    audio.rate = rate;
                    if let Some(sink) = &audio.sink {
                        sink.set_speed(speed(rate));
                    }
                    let _ = reply.send(Ok(()));
                }
                OutputCommand::Position { reply } => {
                    let position = audio
                        .sink
                        .as_ref()
                        .map_or(0.0, |sink| sink.get_pos().as_secs_f64());
                    let _ = reply.send(position);
                }
                OutputCommand::Shutdown => break,
            }
        }

        audio.unload();
        debug!("Audio thread shutting down");
    }

    fn load(&mut self, media: Media) -> Result<LoadedMedia, AudioOutputError> {
        self.unload();

        let bytes = match media {
            Media::File(path) => std::fs::read(&path)
                .map_err(|e| AudioOutputError::Load(format!("{}: {e}", path.display())))?,
            Media::Bytes(bytes) => bytes,
        };
        let decoder =
            Decoder::new(Cursor::new(bytes)).map_err(|e| AudioOutputError::Load(e.to_string()))?;
        let duration = decoder.total_duration().map(|d| d.as_secs_f64());

        let sink = Sink::try_new(&self.handle).map_err(|e| AudioOutputError::Device(e.to_string()))?;
        sink.pause();
        sink.set_speed(speed(self.rate));
        sink.append(decoder);
        let sink = Arc::new(sink);

        self.generation += 1;
        let generation = self.generation;
        self.reportable.store(generation, Ordering::SeqCst);
        self.spawn_end_watcher(Arc::clone(&sink), generation);
        self.sink = Some(sink);

        debug!(generation, ?duration, "Loaded audio");
        Ok(LoadedMedia {
            generation,
            duration,
        })
    }

    fn unload(&mut self) {
        // Clear first so the watcher treats the wake-up as a stop.
        self.reportable.store(0, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn seek(&self, seconds: f64) -> Result<(), AudioOutputError> {
        let sink = self.sink.as_ref().ok_or(AudioOutputError::NotLoaded)?;
        sink.try_seek(seek_target(seconds)?)
            .map_err(|e| AudioOutputError::Seek(e.to_string()))
    }

    fn with_sink(&self, f: impl FnOnce(&Sink)) -> Result<(), AudioOutputError> {
        let sink = self.sink.as_ref().ok_or(AudioOutputError::NotLoaded)?;
        f(sink);
        Ok(())
    }

    /// Block a helper thread on the sink and report a natural end.
    fn spawn_end_watcher(&self, sink: Arc<Sink>, generation: u64) {
        let reportable = Arc::clone(&self.reportable);
        let events = self.events.clone();
        let spawned = thread::Builder::new()
            .name("readcast-audio-end".into())
            .spawn(move || {
                sink.sleep_until_end();
                if reportable
                    .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    debug!(generation, "Playback finished naturally");
                    let _ = events.send(OutputEvent::Ended { generation });
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start end-of-media watcher");
        }
    }
}

fn seek_target(seconds: f64) -> Result<Duration, AudioOutputError> {
    Duration::try_from_secs_f64(seconds.max(0.0))
        .map_err(|e| AudioOutputError::Seek(format!("{seconds}: {e}")))
}
