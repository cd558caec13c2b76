//! End-to-end tests for the Subweave proxy
//!
//! Starts a real Axum server on a random port, with wiremock standing in for
//! the media origin and the caption CDN, and drives it the way a player would.

use m3u8_rs::Playlist;
use reqwest::redirect::Policy;
use std::net::SocketAddr;
use subweave::config::Config;
use subweave::server::{build_router, state::AppState};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST_PATH: &str = "/vod/movie.ism/manifest(format=m3u8-aapl)";

const MASTER: &str = "#EXTM3U\n\
#EXT-X-VERSION:4\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
QualityLevels(800000)/Manifest(video,format=m3u8-aapl)\n";

const CAPTIONS: &str = "WEBVTT\n\n00:00:00.000 --> 00:00:08.000\nHello there.\n";

// ── Test server helpers ───────────────────────────────────────────────────────

/// Spin up the proxy on a random port.
async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: 0,
        base_url: format!("http://{}", addr),
        is_dev: true,
        disguise_scheme: "CUSTOMSCHEME".to_string(),
        manifest_suffix: ".ism/manifest(format=m3u8-aapl)".to_string(),
        subtitle_group_id: "subs".to_string(),
        fetch_timeout_secs: 5,
        fetch_max_attempts: 1,
        fetch_backoff_ms: 0,
        session_ttl_secs: 300,
        subtitles_file: None,
    };

    let app = build_router(AppState::new(config).unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Redirects are part of what we assert on, so the client never follows them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

/// Open session `id` with a single English track served by `cdn`.
async fn open_session(client: &reqwest::Client, addr: SocketAddr, id: &str, cdn: &MockServer) {
    let descriptors = format!(
        r#"[{{"id": 1, "language": "en", "title": "English", "source_url": "{}/en.vtt"}}]"#,
        cdn.uri()
    );
    let resp = client
        .put(format!("http://{}/sessions/{}", addr, id))
        .body(descriptors)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

fn manifest_url(addr: SocketAddr, session: &str, origin: &MockServer) -> String {
    format!(
        "http://{}/sessions/{}/load/CUSTOMSCHEME{}{}",
        addr,
        session,
        origin.uri(),
        MANIFEST_PATH
    )
}

fn subtitle_url(addr: SocketAddr, session: &str, language: &str) -> String {
    format!(
        "http://{}/sessions/{}/load/CUSTOMSCHEMESubtitlePlaylist://{}.m3u8",
        addr, session, language
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check() {
    let addr = start_server().await;

    let resp = client()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_subtitle_injection_flow() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .and(header("x-player-token", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/en.vtt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPTIONS))
        .expect(1)
        .mount(&cdn)
        .await;

    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    // Master manifest: fetched with the player's headers, then rewritten.
    let resp = client
        .get(manifest_url(addr, "movie", &origin))
        .header("x-player-token", "abc123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    let manifest = resp.text().await.unwrap();

    let expected_uri = subtitle_url(addr, "movie", "en");
    assert!(manifest.contains(",SUBTITLES=\"subs\"\n"));
    assert!(manifest.contains(&format!(
        "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",LANGUAGE=\"en\",NAME=\"English\",AUTOSELECT=YES,URI=\"{}\"",
        expected_uri
    )));
    assert!(manifest.starts_with("#EXTM3U\n"));

    match m3u8_rs::parse_playlist_res(manifest.as_bytes()) {
        Ok(Playlist::MasterPlaylist(master)) => {
            assert_eq!(master.variants.len(), 1);
            assert_eq!(master.alternatives.len(), 1);
            assert_eq!(master.alternatives[0].uri.as_deref(), Some(expected_uri.as_str()));
        }
        other => panic!("Expected master playlist, got {:?}", other),
    }

    // Subtitle playlist: synthesized on first request, cached afterwards.
    for _ in 0..2 {
        let resp = client.get(&expected_uri).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let playlist = resp.text().await.unwrap();
        assert!(playlist.starts_with("#EXTM3U\r\n"));
        assert!(playlist.contains("#EXT-X-TARGETDURATION:8\r\n"));
        assert!(playlist.contains("#EXTINF:8\r\n"));
        assert!(playlist.contains(&format!("{}/en.vtt\r\n", cdn.uri())));
        assert!(playlist.trim_end().ends_with("#EXT-X-ENDLIST"));
    }
}

#[tokio::test]
async fn variant_requests_bounce_back_to_origin() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;
    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .get(format!(
            "http://{}/sessions/movie/load/CUSTOMSCHEME{}/vod/movie.ism/QualityLevels(800000)/Manifest(video,format=m3u8-aapl)",
            addr,
            origin.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        format!(
            "{}/vod/movie.ism/QualityLevels(800000)/Manifest(video,format=m3u8-aapl)",
            origin.uri()
        )
    );
}

#[tokio::test]
async fn manifest_probe_is_not_rewritten() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;

    // The probe must never reach the rewriter's fetch.
    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
        .expect(0)
        .mount(&origin)
        .await;

    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .get(manifest_url(addr, "movie", &origin))
        .header("range", "bytes=0-1")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        format!("{}{}", origin.uri(), MANIFEST_PATH)
    );
}

#[tokio::test]
async fn unknown_language_is_not_found() {
    let cdn = MockServer::start().await;
    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .get(subtitle_url(addr, "movie", "de"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn origin_failure_surfaces_as_bad_gateway() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&origin)
        .await;

    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .get(manifest_url(addr, "movie", &origin))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn malformed_captions_are_unprocessable() {
    let cdn = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/en.vtt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT\n\nno cues here\n"))
        .mount(&cdn)
        .await;

    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .get(subtitle_url(addr, "movie", "en"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn deleted_session_stops_serving() {
    let cdn = MockServer::start().await;
    let addr = start_server().await;
    let client = client();
    open_session(&client, addr, "movie", &cdn).await;

    let resp = client
        .delete(format!("http://{}/sessions/movie", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(subtitle_url(addr, "movie", "en"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
