//! Playback controller behavior against a recording engine
//!
//! Drives `PlaybackController` directly with explicit engine events, so every
//! interleaving below is deterministic.

mod helpers;

use helpers::*;
use qari_ap::playback::{
    EngineError, EngineHandle, PlaybackController, PlaybackErrorKind, SessionStatus,
};

async fn controller() -> (PlaybackController<MockEngine>, MockEngine) {
    let engine = MockEngine::new();
    let controller = PlaybackController::new(engine.clone(), catalog().await);
    (controller, engine)
}

/// Select surah `n` with ALAFASY and deliver `Loaded`
async fn ready_controller(n: u16, duration_ms: u64) -> (PlaybackController<MockEngine>, MockEngine) {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(n), ALAFASY);
    controller.handle_engine_event(loaded(engine.last_handle(), duration_ms));
    assert_eq!(controller.status(), SessionStatus::Ready);
    (controller, engine)
}

// ============================================================================
// Handle lifecycle
// ============================================================================

#[tokio::test]
async fn test_at_most_one_live_handle_across_selections() {
    let (mut controller, engine) = controller().await;

    for n in [1, 2, 2, 114, 18, 1] {
        controller.select_surah(surah(n), ALAFASY);
        assert!(engine.live_handles().len() <= 1);
    }
    // Reciter swaps and mid-load reselects too
    controller.reciter_changed(HUSARY);
    controller.select_surah(surah(3), HUSARY);
    controller.handle_engine_event(loaded(engine.last_handle(), 5_000));
    controller.play();
    controller.select_surah(surah(4), ALAFASY);

    assert_eq!(engine.max_live(), 1);
    assert_eq!(engine.live_handles(), vec![engine.last_handle().0]);
}

#[tokio::test]
async fn test_release_precedes_next_create() {
    let (mut controller, engine) = controller().await;

    controller.select_surah(surah(1), ALAFASY);
    let first = engine.last_handle();
    controller.select_surah(surah(2), ALAFASY);

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Create(audio_url(ALAFASY, 1)),
            EngineCall::Stop(first.0),
            EngineCall::Release(first.0),
            EngineCall::Create(audio_url(ALAFASY, 2)),
        ]
    );
}

#[tokio::test]
async fn test_stop_releases_and_clears_session() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    controller.play();

    controller.stop();

    assert!(controller.snapshot().is_none());
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert!(engine.live_handles().is_empty());
}

#[tokio::test]
async fn test_stop_without_session_is_noop() {
    let (mut controller, engine) = controller().await;
    controller.stop();
    assert!(engine.calls().is_empty());
    assert!(controller.snapshot().is_none());
}

#[tokio::test]
async fn test_stop_from_loading_and_error() {
    let (mut controller, engine) = controller().await;

    controller.select_surah(surah(1), ALAFASY);
    assert_eq!(controller.status(), SessionStatus::Loading);
    controller.stop();
    assert!(controller.snapshot().is_none());
    assert!(engine.live_handles().is_empty());

    controller.select_surah(surah(36), TEXT_ONLY);
    assert_eq!(controller.status(), SessionStatus::Error);
    controller.stop();
    assert!(controller.snapshot().is_none());
}

#[tokio::test]
async fn test_unmount_tears_down_and_ignores_later_input() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    let handle = engine.last_handle();

    controller.unmount();
    assert!(controller.is_closed());
    assert!(engine.live_handles().is_empty());

    let calls = engine.calls().len();
    controller.select_surah(surah(2), ALAFASY);
    controller.handle_engine_event(loaded(handle, 1_000));
    assert!(controller.snapshot().is_none());
    assert_eq!(engine.calls().len(), calls);
}

// ============================================================================
// Seek
// ============================================================================

#[tokio::test]
async fn test_seek_clamps_into_duration() {
    let (mut controller, engine) = ready_controller(1, 180_000).await;
    let handle = engine.last_handle().0;

    controller.seek(-500);
    assert_eq!(controller.snapshot().unwrap().position_ms, 0);

    controller.seek(999_999);
    assert_eq!(controller.snapshot().unwrap().position_ms, 180_000);

    controller.seek(42_000);
    assert_eq!(controller.snapshot().unwrap().position_ms, 42_000);

    let seeks: Vec<_> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::Seek(..)))
        .collect();
    assert_eq!(
        seeks,
        vec![
            EngineCall::Seek(handle, 0),
            EngineCall::Seek(handle, 180_000),
            EngineCall::Seek(handle, 42_000),
        ]
    );
}

#[tokio::test]
async fn test_seek_ignored_while_loading() {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(1), ALAFASY);

    controller.seek(10_000);

    assert!(!engine
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::Seek(..))));
    assert_eq!(controller.snapshot().unwrap().position_ms, 0);
}

// ============================================================================
// Toggle
// ============================================================================

#[tokio::test]
async fn test_toggle_noop_when_idle() {
    let (mut controller, engine) = controller().await;
    controller.toggle_play_pause();
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_toggle_noop_in_error() {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(36), TEXT_ONLY);
    let before = controller.snapshot();

    controller.toggle_play_pause();

    assert_eq!(controller.snapshot(), before);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_toggle_alternates_play_and_pause() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    let handle = engine.last_handle().0;

    controller.toggle_play_pause();
    assert_eq!(controller.status(), SessionStatus::Playing);
    controller.toggle_play_pause();
    assert_eq!(controller.status(), SessionStatus::Paused);
    controller.toggle_play_pause();
    assert_eq!(controller.status(), SessionStatus::Playing);

    let tail: Vec<_> = engine.calls().into_iter().skip(1).collect();
    assert_eq!(
        tail,
        vec![
            EngineCall::Play(handle),
            EngineCall::Pause(handle),
            EngineCall::Play(handle),
        ]
    );
}

// ============================================================================
// Reciter capability
// ============================================================================

#[tokio::test]
async fn test_reciter_without_audio_never_reaches_engine() {
    let (mut controller, engine) = controller().await;

    controller.select_surah(surah(36), TEXT_ONLY);

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.last_error, Some(PlaybackErrorKind::UnsupportedReciter));
    assert_eq!(snapshot.surah.number, 36);
    assert_eq!(engine.creates(), 0);
}

#[tokio::test]
async fn test_unknown_reciter_is_unsupported() {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(1), "xx.nobody");
    assert_eq!(
        controller.snapshot().unwrap().last_error,
        Some(PlaybackErrorKind::UnsupportedReciter)
    );
    assert_eq!(engine.creates(), 0);
}

#[tokio::test]
async fn test_reciter_change_reloads_same_surah() {
    let (mut controller, engine) = ready_controller(18, 60_000).await;
    controller.play();
    let old = engine.last_handle();

    controller.reciter_changed(HUSARY);

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.surah.number, 18);
    assert_eq!(snapshot.reciter_id, HUSARY);
    assert_eq!(snapshot.status, SessionStatus::Loading);
    assert!(!engine.live_handles().contains(&old.0));
    assert_eq!(
        engine.calls().last(),
        Some(&EngineCall::Create(audio_url(HUSARY, 18)))
    );
}

#[tokio::test]
async fn test_reciter_change_same_reciter_or_no_session() {
    let (mut controller, engine) = controller().await;
    controller.reciter_changed(HUSARY);
    assert!(controller.snapshot().is_none());
    assert!(engine.calls().is_empty());

    controller.select_surah(surah(1), ALAFASY);
    let calls = engine.calls().len();
    controller.reciter_changed(ALAFASY);
    assert_eq!(engine.calls().len(), calls);
}

// ============================================================================
// Full playback scenario
// ============================================================================

#[tokio::test]
async fn test_load_play_progress_finish() {
    let (mut controller, engine) = controller().await;

    controller.select_surah(surah(1), ALAFASY);
    let handle = engine.last_handle();
    assert_eq!(controller.status(), SessionStatus::Loading);

    controller.handle_engine_event(loaded(handle, 180_000));
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.duration_ms, 180_000);

    controller.play();
    assert_eq!(controller.status(), SessionStatus::Playing);

    controller.handle_engine_event(progress(handle, 90_000));
    assert_eq!(controller.snapshot().unwrap().position_ms, 90_000);

    controller.handle_engine_event(finished(handle));
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.status, SessionStatus::Stopped);
    assert_eq!(snapshot.surah.number, 1);
    // Finished session keeps its stream for restart, no auto-advance
    assert_eq!(engine.live_handles(), vec![handle.0]);
    assert_eq!(engine.creates(), 1);

    controller.restart();
    assert_eq!(controller.status(), SessionStatus::Playing);
    assert_eq!(controller.snapshot().unwrap().position_ms, 0);
}

#[tokio::test]
async fn test_progress_clamped_to_duration() {
    let (mut controller, engine) = ready_controller(1, 10_000).await;
    controller.play();
    controller.handle_engine_event(progress(engine.last_handle(), 12_500));
    assert_eq!(controller.snapshot().unwrap().position_ms, 10_000);
}

#[tokio::test]
async fn test_restart_from_paused() {
    let (mut controller, engine) = ready_controller(1, 180_000).await;
    let handle = engine.last_handle();
    controller.play();
    controller.handle_engine_event(progress(handle, 45_000));
    controller.pause();
    assert_eq!(controller.status(), SessionStatus::Paused);

    controller.restart();

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.status, SessionStatus::Playing);
    let tail: Vec<_> = engine.calls().into_iter().rev().take(2).collect();
    assert_eq!(
        tail,
        vec![EngineCall::Play(handle.0), EngineCall::Seek(handle.0, 0)]
    );
}

#[tokio::test]
async fn test_restart_ignored_before_play() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    let calls = engine.calls().len();
    controller.restart();
    assert_eq!(controller.status(), SessionStatus::Ready);
    assert_eq!(engine.calls().len(), calls);
}

// ============================================================================
// Stale and late events
// ============================================================================

#[tokio::test]
async fn test_status_after_stop_is_ignored() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    let handle = engine.last_handle();
    controller.play();
    controller.stop();

    controller.handle_engine_event(progress(handle, 30_000));
    controller.handle_engine_event(finished(handle));

    assert!(controller.snapshot().is_none());
}

#[tokio::test]
async fn test_late_events_from_superseded_session_dropped() {
    let (mut controller, engine) = controller().await;

    controller.select_surah(surah(1), ALAFASY);
    let a = engine.last_handle();
    controller.select_surah(surah(2), ALAFASY);
    let b = engine.last_handle();
    assert_ne!(a, b);

    controller.handle_engine_event(loaded(a, 99_000));
    controller.handle_engine_event(load_failed(a, EngineError::NotFound("a".into())));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.surah.number, 2);
    assert_eq!(snapshot.status, SessionStatus::Loading);
    assert_eq!(snapshot.duration_ms, 0);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(engine.live_handles(), vec![b.0]);

    controller.handle_engine_event(loaded(b, 20_000));
    assert_eq!(controller.status(), SessionStatus::Ready);
    assert_eq!(controller.snapshot().unwrap().duration_ms, 20_000);
}

#[tokio::test]
async fn test_status_ignored_while_loading() {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(1), ALAFASY);
    controller.handle_engine_event(progress(engine.last_handle(), 3_000));
    controller.handle_engine_event(finished(engine.last_handle()));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Loading);
    assert_eq!(snapshot.position_ms, 0);
}

#[tokio::test]
async fn test_event_for_unknown_handle_without_session() {
    let (mut controller, _engine) = controller().await;
    controller.handle_engine_event(loaded(EngineHandle(77), 1_000));
    assert!(controller.snapshot().is_none());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_load_failure_classification() {
    let cases = [
        (EngineError::NotFound("404".into()), PlaybackErrorKind::NotFound),
        (EngineError::Network("reset".into()), PlaybackErrorKind::NetworkFailure),
        (EngineError::Failure("probe".into()), PlaybackErrorKind::EngineFailure),
    ];

    for (err, kind) in cases {
        let (mut controller, engine) = controller().await;
        controller.select_surah(surah(1), ALAFASY);
        controller.handle_engine_event(load_failed(engine.last_handle(), err));

        let snapshot = controller.snapshot().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Error);
        assert_eq!(snapshot.last_error, Some(kind));
        assert!(engine.live_handles().is_empty(), "failed handle released");
    }
}

#[tokio::test]
async fn test_error_during_playback() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    let handle = engine.last_handle();
    controller.play();
    controller.handle_engine_event(progress(handle, 5_000));

    controller.handle_engine_event(engine_error(handle, EngineError::Network("stalled".into())));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.last_error, Some(PlaybackErrorKind::NetworkFailure));
    assert!(engine.live_handles().is_empty());

    // Further events for the released handle change nothing
    controller.handle_engine_event(progress(handle, 9_000));
    assert_eq!(controller.snapshot(), Some(snapshot));
}

#[tokio::test]
async fn test_create_failure_moves_to_error() {
    let (mut controller, engine) = controller().await;
    engine.fail_next_create(EngineError::Failure("no output device".into()));

    controller.select_surah(surah(1), ALAFASY);

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.last_error, Some(PlaybackErrorKind::EngineFailure));
    assert!(engine.live_handles().is_empty());
}

#[tokio::test]
async fn test_play_failure_moves_to_error() {
    let (mut controller, engine) = ready_controller(1, 60_000).await;
    engine.fail_next_play(EngineError::Network("device lost".into()));

    controller.toggle_play_pause();

    assert_eq!(controller.status(), SessionStatus::Error);
    assert!(engine.live_handles().is_empty());
}

#[tokio::test]
async fn test_reselect_recovers_from_error() {
    let (mut controller, engine) = controller().await;
    controller.select_surah(surah(7), ALAFASY);
    controller.handle_engine_event(load_failed(
        engine.last_handle(),
        EngineError::Network("offline".into()),
    ));
    assert_eq!(controller.status(), SessionStatus::Error);

    controller.select_surah(surah(7), ALAFASY);
    controller.handle_engine_event(loaded(engine.last_handle(), 30_000));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(engine.max_live(), 1);
}

#[tokio::test]
async fn test_each_selection_is_a_new_generation() {
    let (mut controller, _engine) = controller().await;

    controller.select_surah(surah(36), TEXT_ONLY);
    let first = controller.snapshot().unwrap();
    controller.select_surah(surah(36), TEXT_ONLY);
    let second = controller.snapshot().unwrap();
    controller.reciter_changed(ALAFASY);
    let third = controller.snapshot().unwrap();

    assert!(first.generation < second.generation);
    assert!(second.generation < third.generation);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_seek_with_unknown_duration_keeps_target() {
    let (mut controller, engine) = ready_controller(1, 0).await;
    let handle = engine.last_handle().0;

    controller.seek(30_000);
    assert_eq!(controller.snapshot().unwrap().position_ms, 30_000);

    controller.seek(-1);
    assert_eq!(controller.snapshot().unwrap().position_ms, 0);

    assert_eq!(
        engine.calls().last(),
        Some(&EngineCall::Seek(handle, 0))
    );
    assert!(engine.calls().contains(&EngineCall::Seek(handle, 30_000)));
}
