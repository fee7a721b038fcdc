//! End-to-end tests of a single host over HTTP

mod common;

use camhub::source::synthetic::SyntheticCamera;
use camhub::source::DeviceControls;
use camhub::stream::MAX_RECORD_SECS;
use camhub::HostState;
use reqwest::StatusCode;
use serde_json::Value;

use common::{first_frame, wait_for, TestHost};

const ZOOM: &str = "Zoom, Absolute";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_state_lists_cameras() {
    let host = TestHost::start(2, &[]).await;

    let state: HostState = reqwest::get(host.url("/host"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(state.url, host.base);
    assert_eq!(state.interval, 3_600_000);
    assert_eq!(state.streams.len(), 2);
    assert_eq!(state.streams[0].id, 0);
    assert_eq!(state.streams[0].url, "/video0");
    assert_eq!(state.streams[0].config.path, "/dev/video0");
    assert_eq!(state.streams[0].config.codec, "MJPG");
    assert_eq!(state.streams[0].config.width, 1920);
    assert_eq!(state.streams[1].url, "/video1");
    assert_eq!(state.streams[1].config.path, "/dev/video1");

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feed_is_multipart_mjpeg() {
    let host = TestHost::start(1, &[]).await;

    let mut response = reqwest::get(host.url("/video0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/x-mixed-replace"));
    assert!(content_type.contains("boundary="));

    let frame = first_frame(&mut response).await;
    assert_eq!(&frame[..2], &[0xFF, 0xD8]);
    assert_eq!(&frame[frame.len() - 2..], &[0xFF, 0xD9]);

    drop(response);
    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_viewers_share_one_capture() {
    let host = TestHost::start(1, &[]).await;

    let mut a = reqwest::get(host.url("/video0")).await.unwrap();
    let mut b = reqwest::get(host.url("/video0")).await.unwrap();
    first_frame(&mut a).await;
    first_frame(&mut b).await;

    assert_eq!(host.cameras[0].open_count(), 1);

    drop((a, b));
    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_stream_is_not_found() {
    let host = TestHost::start(1, &[]).await;

    for path in ["/video9", "/video9/zoomin", "/cameras"] {
        let response = reqwest::get(host.url(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
    }

    let body: Value = reqwest::get(host.url("/video9"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["error_code"], "NOT_FOUND");

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zoom_walks_to_limit_and_resets() {
    let host = TestHost::start(1, &[]).await;
    let controls = host.cameras[0].controls();
    assert_eq!(controls.get(ZOOM).unwrap(), 50);

    let mut last = 0;
    for _ in 0..7 {
        let body: Value = reqwest::get(host.url("/video0/zoomin"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["control"], ZOOM);
        last = body["value"].as_i64().unwrap();
    }
    // 60, 70, 80, 90, 100, then held at the maximum
    assert_eq!(last, 100);
    assert_eq!(controls.get(ZOOM).unwrap(), 100);

    let body: Value = reqwest::get(host.url("/video0/zoomout"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["value"], 90);

    let response = reqwest::get(host.url("/video0/reset")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(controls.get(ZOOM).unwrap(), 50);

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsupported_control_is_empty_reply() {
    let host = TestHost::start(1, &[]).await;

    let response = reqwest::get(host.url("/video0/focusin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.bytes().await.unwrap().is_empty());

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_is_idempotent() {
    let host = TestHost::start(2, &[]).await;

    for _ in 0..3 {
        host.host.scan().await.unwrap();
    }

    let streams = host.host.streams().await.unwrap();
    assert_eq!(streams.len(), 2);
    assert!(streams.iter().all(|s| s.opened));
    assert_eq!(host.cameras[0].open_count(), 1);
    assert_eq!(host.cameras[1].open_count(), 1);

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unplugged_slot_is_reused() {
    let host = TestHost::start(2, &[]).await;

    host.driver.remove("/dev/video0");
    let h = &host.host;
    wait_for("video0 to close", move || async move {
        !h.stream("/video0").await.unwrap().opened
    })
    .await;

    // A closed slot answers with an empty feed
    let response = reqwest::get(host.url("/video0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let replacement = SyntheticCamera::new("/dev/video7");
    host.driver.add(replacement.clone());
    host.host.scan().await.unwrap();

    let streams = host.host.streams().await.unwrap();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].url, "/video0");
    assert!(streams[0].opened);
    assert_eq!(streams[0].config.path, "/dev/video7");
    assert_eq!(streams[1].config.path, "/dev/video1");
    assert_eq!(host.cameras[1].open_count(), 1);

    let mut response = reqwest::get(host.url("/video0")).await.unwrap();
    first_frame(&mut response).await;
    assert!(replacement.frames_captured() > 0);

    drop(response);
    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replugged_device_keeps_its_url() {
    let host = TestHost::start(2, &[]).await;

    let camera = host.driver.remove("/dev/video1").unwrap();
    let h = &host.host;
    wait_for("video1 to close", move || async move {
        !h.stream("/video1").await.unwrap().opened
    })
    .await;

    host.driver.add(camera.clone());
    host.host.scan().await.unwrap();

    let stream = host.host.stream("/video1").await.unwrap();
    assert!(stream.opened);
    assert_eq!(stream.config.path, "/dev/video1");
    assert_eq!(camera.open_count(), 2);
    assert_eq!(host.host.streams().await.unwrap().len(), 2);

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_record_start_and_stop() {
    let host = TestHost::start(1, &[]).await;

    let body: Value = reqwest::get(host.url("/video0/record?seconds=30"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["recording"], true);
    assert_eq!(body["seconds"], 30);

    let h = &host.host;
    wait_for("recording to start", move || async move {
        h.stream("/video0").await.unwrap().recording
    })
    .await;

    let body: Value = reqwest::get(host.url("/video0/record/stop"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["recording"], false);

    wait_for("recording to stop", move || async move {
        !h.stream("/video0").await.unwrap().recording
    })
    .await;

    let files: Vec<_> = std::fs::read_dir(host.recordings.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("video0-"));
    assert!(files[0].ends_with(".mjpeg"));

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_record_on_closed_stream_is_empty_reply() {
    let host = TestHost::start(1, &[]).await;

    host.driver.remove("/dev/video0");
    let h = &host.host;
    wait_for("video0 to close", move || async move {
        !h.stream("/video0").await.unwrap().opened
    })
    .await;

    let response = reqwest::get(host.url("/video0/record")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    host.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_record_request_keeps_serving() {
    let host = TestHost::start(1, &[]).await;

    let body: Value = reqwest::get(host.url("/video0/record?seconds=18446744073709551615"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["recording"], true);
    assert_eq!(body["seconds"], MAX_RECORD_SECS);

    let h = &host.host;
    wait_for("recording to start", move || async move {
        h.stream("/video0").await.unwrap().recording
    })
    .await;

    let before = host.cameras[0].frames_captured();
    let mut response = reqwest::get(host.url("/video0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    first_frame(&mut response).await;
    assert!(host.cameras[0].frames_captured() > before);
    assert!(host.host.stream("/video0").await.unwrap().opened);

    drop(response);
    host.stop().await;
}
