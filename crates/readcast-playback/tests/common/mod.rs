//! Shared harness for coordinator tests: a recording audio output, a
//! scripted synthesizer and a mocked content store.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use readcast_core::{
    AudioFormat, AudioOutput, AudioOutputError, AudioSource, ContentError, ContentStore,
    LoadedMedia, LocalSpeech, OutputEvent, PlaybackEvent, PlaybackState, QueueDocument, SpeechAudio,
    SpeechError, SpeechSynthesizer, StreamInfo, Synthesized, TextContent,
};
use readcast_playback::{CoordinatorConfig, MemoryQueueRepository, PlaybackCoordinator, QueueStore};
use readcast_tts::TtsCache;
use tempfile::TempDir;
use tokio::sync::broadcast;

// ── Content store ──────────────────────────────────────────────────

mock! {
    pub Content {}

    #[async_trait]
    impl ContentStore for Content {
        async fn fetch_text(&self, content_id: &str) -> Result<TextContent, ContentError>;
        async fn fetch_stream_info(&self, content_id: &str) -> Result<StreamInfo, ContentError>;
    }
}

/// Content store that knows the given `(content_id, text)` pairs.
pub fn content_with(texts: &[(&str, &str)]) -> MockContent {
    let texts: HashMap<String, String> = texts
        .iter()
        .map(|(id, text)| ((*id).to_string(), (*text).to_string()))
        .collect();

    let mut content = MockContent::new();
    content.expect_fetch_text().returning(move |id| {
        texts
            .get(id)
            .map(|text| TextContent {
                text: text.clone(),
                title: id.to_string(),
                author: None,
            })
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    });
    content.expect_fetch_stream_info().never();
    content
}

// ── Synthesizer ────────────────────────────────────────────────────

/// Answers with the text bytes as MP3 after `delay`, or fails. After
/// [`ScriptedSynth::answer_locally`] it writes fallback files instead.
pub struct ScriptedSynth {
    calls: AtomicUsize,
    delay: Duration,
    fail: AtomicBool,
    local_dir: Mutex<Option<PathBuf>>,
}

impl ScriptedSynth {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: AtomicBool::new(false),
            local_dir: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn answer_locally(&self, dir: &Path) {
        *self.local_dir.lock().unwrap() = Some(dir.to_path_buf());
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynth {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Synthesized, SpeechError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpeechError::Exhausted {
                remote: "timed out".to_string(),
                local: "no engine".to_string(),
            });
        }
        let local_dir = self.local_dir.lock().unwrap().clone();
        if let Some(dir) = local_dir {
            let path = dir.join(format!("local-{n}.wav"));
            std::fs::write(&path, text.as_bytes()).map_err(|e| SpeechError::local(e.to_string()))?;
            return Ok(Synthesized::Local(LocalSpeech { path }));
        }
        Ok(Synthesized::Remote(SpeechAudio {
            bytes: text.as_bytes().to_vec(),
            format: AudioFormat::Mp3,
        }))
    }
}

// ── Audio output ───────────────────────────────────────────────────

/// Audio output that records every call.
pub struct MockOutput {
    calls: Mutex<Vec<String>>,
    position: Mutex<f64>,
    duration: Mutex<Option<f64>>,
    generation: AtomicU64,
    loaded: Mutex<Option<AudioSource>>,
    failing_urls: Mutex<HashSet<String>>,
    events: broadcast::Sender<OutputEvent>,
}

impl MockOutput {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            position: Mutex::new(0.0),
            duration: Mutex::new(None),
            generation: AtomicU64::new(0),
            loaded: Mutex::new(None),
            failing_urls: Mutex::new(HashSet::new()),
            events,
        })
    }

    pub fn fail_url(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        *self.duration.lock().unwrap() = duration;
    }

    pub fn set_position(&self, seconds: f64) {
        *self.position.lock().unwrap() = seconds;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn loaded(&self) -> Option<AudioSource> {
        self.loaded.lock().unwrap().clone()
    }

    /// Report a natural end of the current load on the event channel.
    pub fn finish(&self) {
        let _ = self.events.send(OutputEvent::Ended {
            generation: self.generation(),
        });
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AudioOutput for MockOutput {
    async fn load(&self, source: AudioSource) -> Result<LoadedMedia, AudioOutputError> {
        match &source {
            AudioSource::File(path) => self.record(format!("load:file:{}", path.display())),
            AudioSource::Url(url) => {
                self.record(format!("load:url:{url}"));
                if self.failing_urls.lock().unwrap().contains(url) {
                    return Err(AudioOutputError::Load(format!("{url}: 404")));
                }
            }
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.loaded.lock().unwrap() = Some(source);
        *self.position.lock().unwrap() = 0.0;
        Ok(LoadedMedia {
            generation,
            duration: *self.duration.lock().unwrap(),
        })
    }

    async fn play(&self) -> Result<(), AudioOutputError> {
        self.record("play".to_string());
        if self.loaded.lock().unwrap().is_none() {
            return Err(AudioOutputError::NotLoaded);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), AudioOutputError> {
        self.record("pause".to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), AudioOutputError> {
        self.record("stop".to_string());
        *self.loaded.lock().unwrap() = None;
        *self.position.lock().unwrap() = 0.0;
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<(), AudioOutputError> {
        self.record(format!("seek:{seconds}"));
        *self.position.lock().unwrap() = seconds;
        Ok(())
    }

    async fn set_rate(&self, rate: f64) -> Result<(), AudioOutputError> {
        self.record(format!("rate:{rate}"));
        Ok(())
    }

    async fn position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub coordinator: PlaybackCoordinator,
    pub queue: Arc<QueueStore>,
    pub output: Arc<MockOutput>,
    pub synth: Arc<ScriptedSynth>,
    pub cache: TtsCache,
    pub repo: Arc<MemoryQueueRepository>,
    /// Scratch directory for fallback audio.
    pub scratch: TempDir,
    _cache_dir: TempDir,
}

pub struct HarnessBuilder {
    texts: Vec<(String, String)>,
    document: Option<QueueDocument>,
    synth_delay: Duration,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            texts: Vec::new(),
            document: None,
            synth_delay: Duration::from_millis(50),
        }
    }

    pub fn text(mut self, content_id: &str, text: &str) -> Self {
        self.texts.push((content_id.to_string(), text.to_string()));
        self
    }

    pub fn restored(mut self, document: QueueDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn synth_delay(mut self, delay: Duration) -> Self {
        self.synth_delay = delay;
        self
    }

    pub async fn build(self) -> Harness {
        let repo = Arc::new(match self.document {
            Some(doc) => MemoryQueueRepository::with_document(doc),
            None => MemoryQueueRepository::new(),
        });
        let queue = QueueStore::open(repo.clone(), Duration::from_millis(500))
            .await
            .unwrap();

        let cache_dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::open(cache_dir.path(), u64::MAX).await.unwrap();

        let texts: Vec<(&str, &str)> = self
            .texts
            .iter()
            .map(|(id, text)| (id.as_str(), text.as_str()))
            .collect();
        let content = Arc::new(content_with(&texts));
        let synth = ScriptedSynth::new(self.synth_delay);
        let output = MockOutput::new();

        let coordinator = PlaybackCoordinator::new(
            queue.clone(),
            content,
            cache.clone(),
            synth.clone(),
            output.clone(),
            CoordinatorConfig::default(),
        );

        Harness {
            coordinator,
            queue,
            output,
            synth,
            cache,
            repo,
            scratch: tempfile::tempdir().unwrap(),
            _cache_dir: cache_dir,
        }
    }
}

// ── Event helpers ──────────────────────────────────────────────────

/// Everything currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// States carried by `StateChanged` events, consecutive repeats collapsed.
pub fn states(events: &[PlaybackEvent]) -> Vec<PlaybackState> {
    let mut states: Vec<PlaybackState> = Vec::new();
    for event in events {
        if let PlaybackEvent::StateChanged { snapshot } = event
            && states.last() != Some(&snapshot.state)
        {
            states.push(snapshot.state.clone());
        }
    }
    states
}

/// State names, with `Failed` reasons dropped.
pub fn state_names(events: &[PlaybackEvent]) -> Vec<&'static str> {
    states(events).iter().map(PlaybackState::name).collect()
}
