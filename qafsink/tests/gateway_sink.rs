use std::path::PathBuf;
use std::time::Duration;

use qafcatalog::ResolvedTrack;
use qafsink::{AudioSink, GatewaySink, PlaybackEnd, RoomKind, RoomTarget, SinkError};
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target_for(server: &MockServer, room: &str, kind: RoomKind) -> RoomTarget {
    RoomTarget {
        base_url: server.uri(),
        room: room.to_string(),
        kind,
    }
}

fn sink_for(media_base: &str) -> GatewaySink {
    GatewaySink::new(media_base)
        .unwrap()
        .with_timeouts(Duration::from_secs(2), Duration::from_secs(2))
}

fn track(track: u16, reciter: &str) -> ResolvedTrack {
    let file_name = format!("{:03}.mp3", track);
    ResolvedTrack {
        track,
        reciter: reciter.to_string(),
        path: PathBuf::from(format!("/audio/{}/{}", reciter, file_name)),
        file_name,
    }
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_joins_room_and_claims_transmitter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .and(body_partial_json(serde_json::json!({"room": "quran"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/transmitter"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    let target = target_for(&server, "quran", RoomKind::Broadcast);
    sink.connect(&target).await.unwrap();
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_connect_voice_room_skips_transmitter() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/session/transmitter"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_connect_same_room_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    let target = target_for(&server, "quran", RoomKind::Voice);
    sink.connect(&target).await.unwrap();
    sink.connect(&target).await.unwrap();
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_connect_different_room_leaves_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "alpha", RoomKind::Voice))
        .await
        .unwrap();
    sink.connect(&target_for(&server, "beta", RoomKind::Voice))
        .await
        .unwrap();
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_transmitter_refusal_is_not_fatal() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/session/transmitter"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Broadcast))
        .await
        .unwrap();
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_connect_failure_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    let err = sink
        .connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::ConnectFailed(_)));
    assert!(!sink.is_connected());
}

#[tokio::test]
async fn test_play_without_connect_fails() {
    let mut sink = sink_for("http://radio.local/media");
    let (tx, _rx) = mpsc::channel::<PlaybackEnd>(1);
    let err = sink.play(&track(1, "Saad Al Ghamdi"), tx).await.unwrap_err();
    assert!(matches!(err, SinkError::NotConnected));
}

#[tokio::test]
async fn test_play_posts_encoded_media_url() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/player/play"))
        .and(body_partial_json(serde_json::json!({
            "url": "http://radio.local/media/Saad%20Al%20Ghamdi/005.mp3",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/player"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "playing"})),
        )
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel::<PlaybackEnd>(4);
    sink.play(&track(5, "Saad Al Ghamdi"), tx).await.unwrap();
    assert!(sink.is_playing());
    assert!(!sink.is_paused());
}

#[tokio::test]
async fn test_monitor_reports_natural_end() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/player/play"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/player"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "stopped"})),
        )
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel::<PlaybackEnd>(4);
    sink.play(&track(1, "Saad Al Ghamdi"), tx).await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("monitor should report the end")
        .expect("channel should stay open");
    assert!(end.error.is_none());
    assert!(!sink.is_playing());
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_stop_suppresses_end_notice() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/player/play"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/player/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/player"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "playing"})),
        )
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel::<PlaybackEnd>(4);
    sink.play(&track(1, "Saad Al Ghamdi"), tx).await.unwrap();
    sink.stop().await;
    assert!(!sink.is_playing());

    // The aborted monitor must not deliver an end event for the
    // stopped track; the channel either closes silently or stays empty.
    let outcome = tokio::time::timeout(Duration::from_millis(2500), rx.recv()).await;
    assert!(
        !matches!(outcome, Ok(Some(_))),
        "no end notice expected after stop"
    );
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/player/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();
    sink.stop().await;
}

#[tokio::test]
async fn test_pause_and_resume_toggle_flags() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    for player_path in ["/api/player/play", "/api/player/pause", "/api/player/resume"] {
        Mock::given(method("POST"))
            .and(path(player_path))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/player"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "playing"})),
        )
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel::<PlaybackEnd>(4);
    sink.play(&track(1, "Saad Al Ghamdi"), tx).await.unwrap();

    sink.pause().await;
    assert!(sink.is_paused());
    assert!(!sink.is_playing());

    // Pausing twice stays paused.
    sink.pause().await;
    assert!(sink.is_paused());

    sink.resume().await;
    assert!(sink.is_playing());
    assert!(!sink.is_paused());
}

#[tokio::test]
async fn test_monitor_failures_mark_session_lost() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/player/play"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/player"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut sink = sink_for("http://radio.local/media");
    sink.connect(&target_for(&server, "quran", RoomKind::Voice))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel::<PlaybackEnd>(4);
    sink.play(&track(1, "Saad Al Ghamdi"), tx).await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(8), rx.recv())
        .await
        .expect("monitor should give up after repeated failures")
        .expect("channel should stay open");
    assert!(end.error.is_some());
    assert!(!sink.is_connected());
    assert!(!sink.is_playing());
}
