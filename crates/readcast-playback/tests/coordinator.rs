//! Transport, interruption, event and prefetch behavior of the coordinator.

mod common;

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use common::{Harness, HarnessBuilder, drain};
use readcast_core::{
    AudioSource, EnqueuePosition, ItemId, OutputEvent, PlaybackContext, PlaybackError, PlaybackEvent,
    PlaybackState, QUEUE_DOCUMENT_VERSION, QueueDocument, QueueItem, SystemEvent,
};
use readcast_playback::RemoteCommand;

async fn with_streams(count: usize) -> (Harness, Vec<ItemId>) {
    let h = HarnessBuilder::new().build().await;
    let mut ids = Vec::new();
    for i in 0..count {
        let item = QueueItem::stream(format!("e{i}"), format!("https://feeds.test/{i}.mp3"), format!("Episode {i}"));
        ids.push(item.id.clone());
        h.queue.enqueue(item, EnqueuePosition::Append).unwrap();
    }
    (h, ids)
}

/// Let spawned tasks run until `done` holds or a few seconds of virtual
/// time pass.
async fn settle(done: impl Fn() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ── Transport ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_toggle_pauses_and_resumes() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();
    h.output.set_position(8.0);

    h.coordinator.toggle().await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Paused);
    assert!((h.queue.find(&ids[0]).unwrap().last_position - 8.0).abs() < f64::EPSILON);

    h.coordinator.toggle().await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
    assert_eq!(h.output.count("play"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_from_idle_starts_current_queue_item() {
    let (h, ids) = with_streams(2).await;

    h.coordinator.resume().await.unwrap();

    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
    assert_eq!(h.coordinator.context(), PlaybackContext::FromQueue);
    assert_eq!(h.queue.active_item(), Some(ids[0].clone()));
}

#[tokio::test(start_paused = true)]
async fn test_resume_with_empty_queue_has_nothing_to_play() {
    let h = HarnessBuilder::new().build().await;
    let err = h.coordinator.resume().await.unwrap_err();
    assert_eq!(err, PlaybackError::NothingToPlay);
    assert_eq!(h.coordinator.state(), PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_play_resumes_from_stored_position() {
    let mut item = QueueItem::stream("e1", "https://feeds.test/1.mp3", "Episode");
    item.last_position = 42.0;
    let id = item.id.clone();
    let h = HarnessBuilder::new()
        .restored(QueueDocument {
            version: QUEUE_DOCUMENT_VERSION,
            current_index: Some(0),
            items: vec![item],
        })
        .build()
        .await;

    h.coordinator.play(&id, PlaybackContext::Standalone).await.unwrap();
    assert!(h.output.calls().contains(&"seek:42".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_listened_item_starts_from_the_beginning() {
    let mut item = QueueItem::stream("e1", "https://feeds.test/1.mp3", "Episode");
    item.last_position = 42.0;
    item.listened = true;
    let id = item.id.clone();
    let h = HarnessBuilder::new()
        .restored(QueueDocument {
            version: QUEUE_DOCUMENT_VERSION,
            current_index: Some(0),
            items: vec![item],
        })
        .build()
        .await;

    h.coordinator.play(&id, PlaybackContext::Standalone).await.unwrap();
    assert_eq!(h.output.count("seek:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_skip_uses_hop_for_item_kind() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();

    h.output.set_position(5.0);
    h.coordinator.skip_forward().await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:35");

    h.coordinator.skip_backward().await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:5");

    h.coordinator.skip_backward().await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:0");

    let h = HarnessBuilder::new().text("a1", "Some words").build().await;
    let text = QueueItem::text("a1", "Article");
    let text_id = text.id.clone();
    h.queue.enqueue(text, EnqueuePosition::Append).unwrap();
    h.coordinator.play(&text_id, PlaybackContext::Standalone).await.unwrap();
    h.output.set_position(5.0);
    h.coordinator.skip_forward().await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:15");
}

#[tokio::test(start_paused = true)]
async fn test_seek_clamps_to_duration() {
    let (h, ids) = with_streams(1).await;
    h.output.set_duration(Some(20.0));
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();

    h.coordinator.seek(100.0).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:20");

    h.coordinator.seek(-3.0).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:0");
}

#[tokio::test(start_paused = true)]
async fn test_seek_to_infinity_stays_in_range() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();

    h.coordinator.seek(f64::INFINITY).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:0");

    h.output.set_duration(Some(20.0));
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();
    h.coordinator.seek(f64::INFINITY).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:20");
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_seek_without_loaded_item_fails() {
    let h = HarnessBuilder::new().build().await;
    assert_eq!(
        h.coordinator.seek(10.0).await.unwrap_err(),
        PlaybackError::NothingToPlay
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_rate_is_clamped_and_applied() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();

    let applied = h.coordinator.set_rate(5.0).await.unwrap();
    assert!((applied - 3.0).abs() < f64::EPSILON);
    assert_eq!(h.output.calls().last().unwrap(), "rate:3");
    assert!((h.coordinator.current_snapshot().await.rate - 3.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_to_idle() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator.reset().await.unwrap();

    assert_eq!(h.coordinator.state(), PlaybackState::Idle);
    assert_eq!(h.coordinator.context(), PlaybackContext::Standalone);
    assert!(h.coordinator.current_snapshot().await.item.is_none());
}

// ── Previous ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_previous_restarts_past_threshold() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[1], PlaybackContext::FromQueue).await.unwrap();
    h.output.set_position(10.0);

    h.coordinator.previous().await.unwrap();

    assert_eq!(h.output.calls().last().unwrap(), "seek:0");
    assert_eq!(h.queue.read(|q| q.current_index()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_previous_moves_back_near_start() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[1], PlaybackContext::FromQueue).await.unwrap();
    h.output.set_position(1.0);

    h.coordinator.previous().await.unwrap();

    assert_eq!(h.queue.read(|q| q.current_index()), Some(0));
    assert_eq!(h.queue.active_item(), Some(ids[0].clone()));

    // At the head of the queue it restarts instead.
    h.output.set_position(1.0);
    h.coordinator.previous().await.unwrap();
    assert_eq!(h.queue.read(|q| q.current_index()), Some(0));
    assert_eq!(h.output.calls().last().unwrap(), "seek:0");
}

#[tokio::test(start_paused = true)]
async fn test_previous_in_live_feed_uses_history() {
    let h = HarnessBuilder::new().build().await;
    let a = QueueItem::stream("ea", "https://feeds.test/a.mp3", "A").with_feed_label("A");
    let b = QueueItem::stream("eb", "https://feeds.test/b.mp3", "B").with_feed_label("B");
    let (a_id, b_id) = (a.id.clone(), b.id.clone());
    h.queue.enqueue(a, EnqueuePosition::Append).unwrap();
    h.queue.enqueue(b, EnqueuePosition::Append).unwrap();

    h.coordinator.play(&a_id, PlaybackContext::live_feed("A")).await.unwrap();
    h.coordinator.next().await.unwrap();
    assert_eq!(h.queue.active_item(), Some(b_id));

    h.coordinator.previous().await.unwrap();
    assert_eq!(h.queue.active_item(), Some(a_id));
    assert_eq!(h.coordinator.context(), PlaybackContext::live_feed("A"));
}

// ── Output events ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_natural_end_advances_queue() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.start();
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();
    let mut rx = h.coordinator.subscribe();

    h.output.finish();
    settle(|| h.queue.active_item().as_ref() == Some(&ids[1])).await;

    assert_eq!(h.queue.active_item(), Some(ids[1].clone()));
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
    assert!(h.queue.find(&ids[0]).unwrap().listened);
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        PlaybackEvent::AutoAdvanced { from_id: Some(from), to_id } if from == &ids[0] && to_id == &ids[1]
    )));
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_of_last_item_stops() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_output_event(OutputEvent::Ended {
            generation: h.output.generation(),
        })
        .await;

    assert_eq!(h.coordinator.state(), PlaybackState::Stopped);
    assert!(h.queue.find(&ids[0]).unwrap().listened);
    assert_eq!(h.queue.active_item(), None);
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_of_standalone_play_does_not_advance() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[0], PlaybackContext::Standalone).await.unwrap();

    h.coordinator
        .handle_output_event(OutputEvent::Ended {
            generation: h.output.generation(),
        })
        .await;

    assert_eq!(h.coordinator.state(), PlaybackState::Stopped);
    assert_eq!(h.output.count("load:"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_output_event_ignored() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();
    let stale = h.output.generation();
    h.coordinator.next().await.unwrap();

    h.coordinator
        .handle_output_event(OutputEvent::Ended { generation: stale })
        .await;
    h.coordinator
        .handle_output_event(OutputEvent::Failed {
            generation: stale,
            reason: "decoder".to_string(),
        })
        .await;

    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
    assert_eq!(h.queue.active_item(), Some(ids[1].clone()));
    assert!(!h.queue.find(&ids[0]).unwrap().listened);
}

#[tokio::test(start_paused = true)]
async fn test_output_failure_marks_item_failed() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();
    let mut rx = h.coordinator.subscribe();

    h.coordinator
        .handle_output_event(OutputEvent::Failed {
            generation: h.output.generation(),
            reason: "decoder error".to_string(),
        })
        .await;

    assert!(h.coordinator.state().is_failed());
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        PlaybackEvent::ItemFailed { item_id, error: PlaybackError::ResourceLoadFailed { .. } } if item_id == &ids[0]
    )));
}

// ── System events ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_interruption_pauses_and_resumes() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_system_event(SystemEvent::InterruptionBegan)
        .await
        .unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Paused);
    assert_eq!(
        h.coordinator.resume().await.unwrap_err(),
        PlaybackError::InterruptedBySystem
    );

    h.coordinator
        .handle_system_event(SystemEvent::InterruptionEnded {
            should_resume: true,
        })
        .await
        .unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_user_pause_during_interruption_wins() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_system_event(SystemEvent::InterruptionBegan)
        .await
        .unwrap();
    h.coordinator.pause().await.unwrap();
    h.coordinator
        .handle_system_event(SystemEvent::InterruptionEnded {
            should_resume: true,
        })
        .await
        .unwrap();

    assert_eq!(h.coordinator.state(), PlaybackState::Paused);
    h.coordinator.resume().await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_interruption_without_resume_hint_stays_paused() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_system_event(SystemEvent::InterruptionBegan)
        .await
        .unwrap();
    h.coordinator
        .handle_system_event(SystemEvent::InterruptionEnded {
            should_resume: false,
        })
        .await
        .unwrap();

    assert_eq!(h.coordinator.state(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_route_loss_pauses() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_system_event(SystemEvent::RouteLost)
        .await
        .unwrap();

    assert_eq!(h.coordinator.state(), PlaybackState::Paused);
    assert_eq!(h.output.count("pause"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_foreground_sweeps_expired_items() {
    let h = HarnessBuilder::new().build().await;
    let playing = QueueItem::stream("e0", "https://feeds.test/0.mp3", "Now")
        .with_expiry(Utc::now() - ChronoDuration::hours(1));
    let stale = QueueItem::stream("e1", "https://feeds.test/1.mp3", "Old")
        .with_expiry(Utc::now() - ChronoDuration::hours(1));
    let fresh = QueueItem::stream("e2", "https://feeds.test/2.mp3", "New")
        .with_expiry(Utc::now() + ChronoDuration::hours(1));
    let (playing_id, stale_id) = (playing.id.clone(), stale.id.clone());
    for item in [playing, stale, fresh] {
        h.queue.enqueue(item, EnqueuePosition::Append).unwrap();
    }
    h.coordinator.play(&playing_id, PlaybackContext::FromQueue).await.unwrap();

    h.coordinator
        .handle_system_event(SystemEvent::Foreground)
        .await
        .unwrap();

    assert_eq!(h.queue.len(), 2);
    assert!(h.queue.find(&stale_id).is_none());
    assert!(h.queue.find(&playing_id).is_some());
}

// ── Remote commands ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_remote_commands_drive_transport() {
    let (h, _) = with_streams(2).await;

    h.coordinator.dispatch(RemoteCommand::Play).await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);

    h.coordinator.dispatch(RemoteCommand::SetRate(2.0)).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "rate:2");

    h.coordinator.dispatch(RemoteCommand::SeekTo(7.5)).await.unwrap();
    assert_eq!(h.output.calls().last().unwrap(), "seek:7.5");

    h.coordinator.dispatch(RemoteCommand::Toggle).await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Paused);

    h.coordinator.dispatch(RemoteCommand::Next).await.unwrap();
    assert_eq!(h.queue.read(|q| q.current_index()), Some(1));

    h.coordinator.dispatch(RemoteCommand::Stop).await.unwrap();
    assert_eq!(h.coordinator.state(), PlaybackState::Stopped);
}

// ── Speech failures ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_fails_item() {
    let h = HarnessBuilder::new().text("a1", "Unlucky text").build().await;
    h.synth.set_failing(true);
    let item = QueueItem::text("a1", "Article");
    let id = item.id.clone();
    h.queue.enqueue(item, EnqueuePosition::Append).unwrap();

    let err = h
        .coordinator
        .play(&id, PlaybackContext::Standalone)
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::SynthesisFailed { .. }));
    assert!(h.coordinator.state().is_failed());
    assert_eq!(h.output.count("load:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_or_blank_content_is_unavailable() {
    let h = HarnessBuilder::new().text("blank", "   \n ").build().await;
    let blank = QueueItem::text("blank", "Blank");
    let missing = QueueItem::text("gone", "Gone");
    let (blank_id, missing_id) = (blank.id.clone(), missing.id.clone());
    h.queue.enqueue(blank, EnqueuePosition::Append).unwrap();
    h.queue.enqueue(missing, EnqueuePosition::Append).unwrap();

    for id in [blank_id, missing_id] {
        let err = h
            .coordinator
            .play(&id, PlaybackContext::Standalone)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::ContentUnavailable { .. }));
    }
    assert_eq!(h.synth.calls(), 0);
}

// ── Prefetch ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_queue_play_prefetches_next_text_item() {
    let h = HarnessBuilder::new()
        .text("t1", "First article")
        .text("t2", "Second article")
        .build()
        .await;
    let first = QueueItem::text("t1", "One");
    let second = QueueItem::text("t2", "Two");
    let first_id = first.id.clone();
    h.queue.enqueue(first, EnqueuePosition::Append).unwrap();
    h.queue.enqueue(second, EnqueuePosition::Append).unwrap();

    h.coordinator.play(&first_id, PlaybackContext::FromQueue).await.unwrap();
    settle(|| h.cache.stats().entries == 2).await;
    assert_eq!(h.synth.calls(), 2);

    h.coordinator.next().await.unwrap();
    assert_eq!(h.synth.calls(), 2);
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_removing_item_cancels_its_prefetch() {
    let h = HarnessBuilder::new()
        .text("t1", "Slow article")
        .synth_delay(Duration::from_secs(10))
        .build()
        .await;
    let item = QueueItem::text("t1", "Slow");
    let id = item.id.clone();
    h.queue.enqueue(item, EnqueuePosition::Append).unwrap();

    h.coordinator.prefetch(&id).unwrap();
    assert!(h.coordinator.is_prefetching(&id));

    h.coordinator.remove(0).await.unwrap();
    assert!(!h.coordinator.is_prefetching(&id));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.cache.stats().in_flight, 0);
    assert_eq!(h.cache.stats().entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_play_during_local_prefetch_keeps_its_audio() {
    let h = HarnessBuilder::new().text("t1", "Offline article").build().await;
    h.synth.answer_locally(h.scratch.path());
    let item = QueueItem::text("t1", "Offline");
    let id = item.id.clone();
    h.queue.enqueue(item, EnqueuePosition::Append).unwrap();

    h.coordinator.prefetch(&id).unwrap();
    h.coordinator.play(&id, PlaybackContext::FromQueue).await.unwrap();
    settle(|| !h.coordinator.is_prefetching(&id)).await;

    assert_eq!(h.synth.calls(), 1);
    assert_eq!(h.coordinator.state(), PlaybackState::Playing);
    let Some(AudioSource::File(path)) = h.output.loaded() else {
        panic!("expected a local file to be loaded");
    };
    assert_eq!(std::fs::read(&path).unwrap(), b"Offline article");

    h.coordinator.stop().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_unknown_item_is_rejected() {
    let h = HarnessBuilder::new().build().await;
    let err = h.coordinator.prefetch(&ItemId::new()).unwrap_err();
    assert!(matches!(err, PlaybackError::Queue(_)));
}

// ── Progress and shutdown ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_progress_ticks_record_position() {
    let (h, ids) = with_streams(1).await;
    h.coordinator.start();
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();
    let mut rx = h.coordinator.subscribe();

    h.output.set_position(12.0);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let progress = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PlaybackEvent::Progress { snapshot } => Some(snapshot.position_seconds),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert!(progress.contains(&12.0));
    assert!((h.queue.find(&ids[0]).unwrap().last_position - 12.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_queue() {
    let (h, ids) = with_streams(2).await;
    h.coordinator.play(&ids[0], PlaybackContext::FromQueue).await.unwrap();

    h.coordinator.shutdown().await.unwrap();

    let document = h.repo.document().unwrap();
    assert_eq!(document.items.len(), 2);
    assert_eq!(document.current_index, Some(0));
    assert_eq!(h.coordinator.state(), PlaybackState::Stopped);
}
