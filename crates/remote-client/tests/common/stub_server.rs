//! Minimal JSON-RPC player plugin for exercising `HttpTransport`.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{extract::State, response::Json, routing::post, Router};
use remote_proto::config::ServerConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct StubPlayer {
    /// (playlist_id, track_id) → rating
    ratings: HashMap<(i64, i64), i64>,
    volume: i64,
}

type Shared = Arc<Mutex<StubPlayer>>;

/// Starts the stub on an ephemeral port and returns a config pointing at it.
pub async fn start() -> ServerConfig {
    let player: Shared = Arc::new(Mutex::new(StubPlayer {
        volume: 40,
        ..Default::default()
    }));
    let app = Router::new()
        .route("/RPC_JSON", post(handle))
        .with_state(player);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    ServerConfig {
        url: format!("http://{}", addr),
        ..Default::default()
    }
}

async fn handle(State(player): State<Shared>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let params = &request["params"];
    let method = request["method"].as_str().unwrap_or_default();
    let mut player = player.lock().unwrap();

    let key = (
        params["playlist_id"].as_i64().unwrap_or(0),
        params["track_id"].as_i64().unwrap_or(0),
    );
    let outcome: Result<Value, (i64, &str)> = match method {
        "SetTrackRating" => match params["rating"].as_i64() {
            Some(r) if (0..=5).contains(&r) => {
                player.ratings.insert(key, r);
                Ok(json!({}))
            }
            _ => Err((13, "Rating is out of range [0, 5].")),
        },
        "GetPlaylistEntryInfo" if key.0 == 404 => Err((5, "Specified track does not exist.")),
        "GetPlaylistEntryInfo" => Ok(json!({
            "id": key.1,
            "playlist_id": key.0,
            "title": "Song",
            "rating": player.ratings.get(&key).copied().unwrap_or(0),
        })),
        "VolumeLevel" => {
            if let Some(level) = params["level"].as_i64() {
                player.volume = level;
            }
            Ok(json!({ "volume": player.volume }))
        }
        "Version" => Ok(json!({ "aimp_version": "5.11", "plugin_version": "1.0.0" })),
        _ => Err((-32601, "Method not found")),
    };

    Json(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        }),
    })
}
