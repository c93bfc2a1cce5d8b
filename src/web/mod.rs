// HTTP remote control - the only way in from outside. Every endpoint maps
// 1:1 onto one queue-engine operation and succeeds even when the named
// track no longer resolves: remotes poke at stale listings all the time and
// a dead button press must never surface as an error.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::queue::{Jukebox, SharedJukebox};

#[derive(Clone)]
pub struct WebContext {
    pub jukebox: SharedJukebox,
    /// Extra request paths that ask the process to exit, mapped to the
    /// requested exit code.
    pub quit_commands: Arc<HashMap<String, i32>>,
}

const INDEX: &str = "\
calliope remote control

  /tracklist  /playlist  /history  /status
  /add?ID  /insert?ID  /playnow?ID  /remove?ID  /rollback?ID
  /prev  /next  /play  /stop  /rescan
";

pub fn router(ctx: WebContext) -> Router {
    Router::new()
        .route("/", get(|| async { plain(INDEX.to_string()) }))
        .route("/tracklist", get(tracklist))
        .route("/playlist", get(playlist))
        .route("/history", get(history))
        .route("/status", get(status))
        .route("/add", get(add))
        .route("/insert", get(insert))
        .route("/playnow", get(play_now))
        .route("/remove", get(remove))
        .route("/rollback", get(rollback))
        .route("/prev", get(prev))
        .route("/next", get(next))
        .route("/play", get(play))
        .route("/stop", get(stop))
        .route("/rescan", get(rescan))
        .fallback(fallback)
        .with_state(ctx)
}

pub async fn serve(listener: tokio::net::TcpListener, ctx: WebContext) -> anyhow::Result<()> {
    info!("remote control listening on {}", listener.local_addr()?);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

/// Run one operation under the jukebox lock, off the async runtime: a stop
/// can legitimately hold the lock for the full 2 s termination timeout.
async fn with_jukebox<T, F>(ctx: &WebContext, op: F) -> T
where
    F: FnOnce(&mut Jukebox) -> T + Send + 'static,
    T: Send + 'static,
{
    let jukebox = ctx.jukebox.clone();
    tokio::task::spawn_blocking(move || {
        let mut jb = jukebox.lock().unwrap();
        op(&mut jb)
    })
    .await
    .expect("jukebox operation panicked")
}

fn plain(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// The raw query string is the track id; anything unparsable is treated the
/// same as an id that no longer resolves.
fn query_id(query: Option<String>) -> Option<u64> {
    query.and_then(|q| q.trim().parse().ok())
}

async fn tracklist(State(ctx): State<WebContext>, headers: HeaderMap) -> Response {
    let wants_deflate = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("deflate"));
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    with_jukebox(&ctx, move |jb| {
        let registry = jb.registry();
        let Some(tag) = registry.scan_tag().map(str::to_string) else {
            // nothing scanned yet, serve an uncached listing
            let listing = registry
                .tracks()
                .iter()
                .map(|t| t.fmt(""))
                .collect::<Vec<_>>()
                .join("\n");
            return plain(listing);
        };
        if if_none_match.as_deref() == Some(tag.as_str()) {
            return StatusCode::NOT_MODIFIED.into_response();
        }

        let deflated = if wants_deflate {
            registry.tracklist_deflated().map(<[u8]>::to_vec)
        } else {
            None
        };
        match deflated {
            Some(body) => (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (header::CONTENT_ENCODING, "deflate"),
                    (header::ETAG, tag.as_str()),
                ],
                body,
            )
                .into_response(),
            None => (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (header::ETAG, tag.as_str()),
                ],
                registry.tracklist().unwrap_or_default().to_string(),
            )
                .into_response(),
        }
    })
    .await
}

async fn playlist(State(ctx): State<WebContext>) -> Response {
    plain(with_jukebox(&ctx, |jb| jb.playlist_lines()).await)
}

async fn history(State(ctx): State<WebContext>) -> Response {
    plain(with_jukebox(&ctx, |jb| jb.history_lines()).await)
}

#[derive(Serialize)]
struct TrackInfo {
    id: u64,
    label: String,
}

#[derive(Serialize)]
struct StatusInfo {
    running: bool,
    current: Option<TrackInfo>,
    auto_playlist: bool,
    playlist_length: usize,
    history_length: usize,
    track_count: usize,
}

async fn status(State(ctx): State<WebContext>) -> Json<StatusInfo> {
    Json(
        with_jukebox(&ctx, |jb| StatusInfo {
            running: jb.is_running(),
            current: jb.current_track().map(|t| TrackInfo {
                id: t.id,
                label: t.label.clone(),
            }),
            auto_playlist: jb.is_auto_playlist(),
            playlist_length: jb.playlist_len(),
            history_length: jb.history_len(),
            track_count: jb.registry().len(),
        })
        .await,
    )
}

async fn add(State(ctx): State<WebContext>, RawQuery(query): RawQuery) -> StatusCode {
    if let Some(id) = query_id(query) {
        with_jukebox(&ctx, move |jb| jb.add_to_back(id)).await;
    }
    StatusCode::OK
}

async fn insert(State(ctx): State<WebContext>, RawQuery(query): RawQuery) -> StatusCode {
    if let Some(id) = query_id(query) {
        with_jukebox(&ctx, move |jb| jb.add_to_front(id)).await;
    }
    StatusCode::OK
}

async fn play_now(State(ctx): State<WebContext>, RawQuery(query): RawQuery) -> StatusCode {
    if let Some(id) = query_id(query) {
        with_jukebox(&ctx, move |jb| jb.play_now(id)).await;
    }
    StatusCode::OK
}

async fn remove(State(ctx): State<WebContext>, RawQuery(query): RawQuery) -> StatusCode {
    if let Some(id) = query_id(query) {
        with_jukebox(&ctx, move |jb| jb.remove(id)).await;
    }
    StatusCode::OK
}

async fn rollback(State(ctx): State<WebContext>, RawQuery(query): RawQuery) -> StatusCode {
    if let Some(id) = query_id(query) {
        with_jukebox(&ctx, move |jb| jb.rewind_to(id)).await;
    }
    StatusCode::OK
}

async fn prev(State(ctx): State<WebContext>) -> StatusCode {
    with_jukebox(&ctx, |jb| jb.go_back()).await;
    StatusCode::OK
}

async fn next(State(ctx): State<WebContext>) -> StatusCode {
    with_jukebox(&ctx, |jb| jb.advance(true)).await;
    StatusCode::OK
}

async fn play(State(ctx): State<WebContext>) -> StatusCode {
    with_jukebox(&ctx, |jb| jb.play()).await;
    StatusCode::OK
}

async fn stop(State(ctx): State<WebContext>) -> StatusCode {
    with_jukebox(&ctx, |jb| jb.halt()).await;
    StatusCode::OK
}

async fn rescan(State(ctx): State<WebContext>) -> StatusCode {
    with_jukebox(&ctx, |jb| jb.rescan()).await;
    StatusCode::OK
}

async fn fallback(State(ctx): State<WebContext>, uri: axum::http::Uri) -> StatusCode {
    let path = uri.path().trim_matches('/').to_ascii_lowercase();
    if let Some(&code) = ctx.quit_commands.get(&path) {
        with_jukebox(&ctx, move |jb| jb.request_exit(code)).await;
        return StatusCode::OK;
    }
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MediaScanner;
    use crate::player::PlayerSupervisor;
    use crate::queue::JukeboxOptions;
    use axum::body::Body;
    use axum::http::Request;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_context(tracks: &[&str], quits: &[(&str, i32)]) -> (WebContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        for name in tracks {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let scanner = MediaScanner::new(&["mp3".to_string()]);
        let player = PlayerSupervisor::new(
            vec!["true".to_string(), "$".to_string()],
            None,
            Duration::from_secs(3),
            5,
        );
        let options = JukeboxOptions {
            state_file: dir.path().join("state"),
            autosave: false,
            autoscan: false,
            max_history: 250,
            min_play_time: Duration::from_secs(120),
        };
        let mut jukebox = Jukebox::new(dir.path().to_path_buf(), scanner, player, options);
        jukebox.rescan();
        let ctx = WebContext {
            jukebox: Arc::new(Mutex::new(jukebox)),
            quit_commands: Arc::new(
                quits
                    .iter()
                    .map(|(cmd, code)| (cmd.to_string(), *code))
                    .collect(),
            ),
        };
        (ctx, dir)
    }

    async fn fetch(ctx: WebContext, uri: &str) -> (StatusCode, String) {
        let response = router(ctx)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn tracklist_lists_all_tracks_with_ids() {
        let (ctx, _dir) = test_context(&["a.mp3", "b.mp3"], &[]);
        let (status, body) = fetch(ctx, "/tracklist").await;
        assert_eq!(status, StatusCode::OK);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains('\t')));
    }

    #[tokio::test]
    async fn tracklist_honors_the_scan_tag() {
        let (ctx, _dir) = test_context(&["a.mp3"], &[]);
        let tag = ctx
            .jukebox
            .lock()
            .unwrap()
            .registry()
            .scan_tag()
            .unwrap()
            .to_string();
        let response = router(ctx)
            .oneshot(
                Request::builder()
                    .uri("/tracklist")
                    .header(header::IF_NONE_MATCH, &tag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn unresolvable_ids_are_accepted_noops() {
        let (ctx, _dir) = test_context(&["a.mp3"], &[]);
        let (status, _) = fetch(ctx.clone(), "/add?99999").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = fetch(ctx.clone(), "/remove?notanumber").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = fetch(ctx, "/rollback?").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn add_queues_a_track() {
        let (ctx, _dir) = test_context(&["a.mp3", "b.mp3"], &[]);
        let id = ctx
            .jukebox
            .lock()
            .unwrap()
            .registry()
            .find_by_key("a")
            .unwrap()
            .id;
        let (status, _) = fetch(ctx.clone(), &format!("/add?{id}")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = fetch(ctx, "/playlist").await;
        assert!(body.lines().any(|l| l.ends_with("\ta")));
    }

    #[tokio::test]
    async fn quit_commands_request_an_exit_code() {
        let (ctx, _dir) = test_context(&[], &[("shutdown", 7)]);
        let (status, _) = fetch(ctx.clone(), "/shutdown").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx.jukebox.lock().unwrap().exit_code(), Some(7));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (ctx, _dir) = test_context(&[], &[]);
        let (status, _) = fetch(ctx, "/definitely-not-a-command").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_the_idle_state() {
        let (ctx, _dir) = test_context(&["a.mp3"], &[]);
        let (status, body) = fetch(ctx, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["running"], false);
        assert_eq!(parsed["track_count"], 1);
        assert!(parsed["current"].is_null());
    }
}
