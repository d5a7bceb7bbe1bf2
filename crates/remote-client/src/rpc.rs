//! Typed façade over [`Transport`].
//!
//! Every operation validates its arguments before touching the wire and
//! normalizes the response into a protocol type.  Each call resolves exactly
//! once with `Ok` or `Err`; whatever the caller does after the `.await` is the
//! unconditional completion hook.

use std::sync::Arc;

use remote_proto::protocol::{
    method, Capabilities, ControlPanelState, EntryLocation, ListPage, ListRequest,
    PlaybackState, PlayingSource, Playlist, PlaylistId, Push, Rating, RawEntryLocation, Topic,
    TrackId, TrackInfo, TrackRef, ValidationError, VersionInfo, Volume,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{RemoteError, RemoteResult};
use crate::transport::{CallMode, Transport};

/// Cheaply cloneable handle; all clones share one transport.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call(&self, method: &str, params: Value) -> RemoteResult<Value> {
        self.transport
            .call(method, params, CallMode::Immediate)
            .await
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> RemoteResult<T> {
        let result = self.call(method, params).await?;
        decode(method, result)
    }

    /// Reads one field of an object result.
    async fn call_field<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        key: &str,
    ) -> RemoteResult<T> {
        let mut result = self.call(method, params).await?;
        let value = result
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| RemoteError::malformed(method, format!("missing '{}'", key)))?;
        decode(method, value)
    }

    // ── state & subscriptions ─────────────────────────────────────────────────

    pub async fn control_panel_state(&self) -> RemoteResult<ControlPanelState> {
        self.call_as(method::CONTROL_PANEL_STATE, json!({})).await
    }

    /// Long poll: resolves when the server fires `topic`.
    pub async fn subscribe(&self, topic: Topic) -> RemoteResult<Push> {
        let result = self
            .transport
            .call(
                method::SUBSCRIBE,
                json!({ "event": topic.event_name() }),
                CallMode::LongPoll,
            )
            .await?;
        Push::decode(topic, result).map_err(|e| RemoteError::malformed(method::SUBSCRIBE, e))
    }

    // ── playlists ─────────────────────────────────────────────────────────────

    /// Lists playlists with the given fields; `id` and `title` are always included.
    pub async fn playlists(&self, fields: &[&str]) -> RemoteResult<Vec<Playlist>> {
        let mut requested = vec!["id", "title"];
        requested.extend(fields.iter().filter(|f| !matches!(**f, "id" | "title")));
        self.call_as(method::PLAYLISTS, json!({ "fields": requested }))
            .await
    }

    pub async fn playlist_entries(
        &self,
        playlist_id: PlaylistId,
        request: &ListRequest,
    ) -> RemoteResult<ListPage> {
        let playlist_id = playlist_id.require_real()?;
        let raw: RawPage = self
            .call_as(method::PLAYLIST_ENTRIES, request.params(playlist_id))
            .await?;
        raw.normalize(&request.fields)
    }

    pub async fn playlist_entries_count(&self, playlist_id: PlaylistId) -> RemoteResult<u64> {
        let playlist_id = playlist_id.require_real()?;
        self.call_as(
            method::PLAYLIST_ENTRIES_COUNT,
            json!({ "playlist_id": playlist_id }),
        )
        .await
    }

    /// Finds `track_id` in the sort/filter representation described by `request`.
    pub async fn locate_entry(
        &self,
        playlist_id: PlaylistId,
        request: &ListRequest,
        track_id: TrackId,
    ) -> RemoteResult<Option<EntryLocation>> {
        let playlist_id = playlist_id.require_real()?;
        let mut params = request.params(playlist_id);
        params["track_id"] = json!(track_id);
        let raw: RawEntryLocation = self.call_as(method::ENTRY_POSITION, params).await?;
        Ok(raw.into_location())
    }

    // ── tracks ────────────────────────────────────────────────────────────────

    pub async fn formatted_track_title(
        &self,
        track: TrackRef,
        format_string: &str,
    ) -> RemoteResult<String> {
        let mut params = track.params();
        params["format_string"] = json!(format_string);
        self.call_field(method::FORMATTED_TITLE, params, "formatted_string")
            .await
    }

    pub async fn track_info(&self, track: TrackRef) -> RemoteResult<TrackInfo> {
        self.call_as(method::TRACK_INFO, track.params()).await
    }

    /// Sets the rating; [`Rating::UNSET`] clears it.
    pub async fn set_track_rating(&self, track: TrackRef, rating: Rating) -> RemoteResult<()> {
        let mut params = track.params();
        params["rating"] = json!(rating);
        self.call(method::SET_TRACK_RATING, params).await?;
        Ok(())
    }

    /// URI of the album cover, optionally scaled to `(width, height)`.
    pub async fn cover_uri(&self, track: TrackRef, size: Option<(u32, u32)>) -> RemoteResult<String> {
        let mut params = track.params();
        if let Some((width, height)) = size {
            params["cover_width"] = json!(width);
            params["cover_height"] = json!(height);
        }
        self.call_field(method::COVER, params, "album_cover_uri")
            .await
    }

    // ── playback ──────────────────────────────────────────────────────────────

    /// Starts playback.  `None` resumes the current track.
    pub async fn play(&self, track: Option<TrackRef>) -> RemoteResult<PlaybackState> {
        let params = track.map(|t| t.params()).unwrap_or_else(|| json!({}));
        self.call_field(method::PLAY, params, "playback_state")
            .await
    }

    pub async fn pause(&self) -> RemoteResult<PlaybackState> {
        self.call_field(method::PAUSE, json!({}), "playback_state")
            .await
    }

    pub async fn stop(&self) -> RemoteResult<PlaybackState> {
        self.call_field(method::STOP, json!({}), "playback_state")
            .await
    }

    pub async fn play_previous(&self) -> RemoteResult<PlayingSource> {
        self.call_as(method::PLAY_PREVIOUS, json!({})).await
    }

    pub async fn play_next(&self) -> RemoteResult<PlayingSource> {
        self.call_as(method::PLAY_NEXT, json!({})).await
    }

    /// Seeks the current track to `position` seconds.
    pub async fn set_track_position(&self, position: f64) -> RemoteResult<()> {
        if !position.is_finite() || position < 0.0 {
            return Err(ValidationError::BadPosition(position).into());
        }
        self.call(method::TRACK_POSITION, json!({ "position": position.round() as u64 }))
            .await?;
        Ok(())
    }

    // ── modes: `None` reads, `Some` writes; both return the server's value ────

    pub async fn volume(&self, level: Option<Volume>) -> RemoteResult<Volume> {
        let params = level.map(|l| json!({ "level": l })).unwrap_or_else(|| json!({}));
        let raw: i64 = self.call_field(method::VOLUME, params, "volume").await?;
        Volume::new(raw).map_err(|e| RemoteError::malformed(method::VOLUME, e))
    }

    pub async fn mute(&self, on: Option<bool>) -> RemoteResult<bool> {
        self.mode(method::MUTE, "mute_on", "mute_mode_on", on).await
    }

    pub async fn shuffle(&self, on: Option<bool>) -> RemoteResult<bool> {
        self.mode(method::SHUFFLE, "shuffle_on", "shuffle_mode_on", on)
            .await
    }

    pub async fn repeat(&self, on: Option<bool>) -> RemoteResult<bool> {
        self.mode(method::REPEAT, "repeat_on", "repeat_mode_on", on)
            .await
    }

    pub async fn radio_capture(&self, on: Option<bool>) -> RemoteResult<bool> {
        self.mode(
            method::RADIO_CAPTURE,
            "radio_capture_on",
            "radio_capture_mode_on",
            on,
        )
        .await
    }

    async fn mode(
        &self,
        method: &str,
        param: &str,
        result_key: &str,
        on: Option<bool>,
    ) -> RemoteResult<bool> {
        let mut params = Map::new();
        if let Some(on) = on {
            params.insert(param.to_string(), json!(on));
        }
        self.call_field(method, Value::Object(params), result_key)
            .await
    }

    // ── queue & playlist editing ──────────────────────────────────────────────

    pub async fn enqueue_track(&self, track: TrackRef, at_queue_beginning: bool) -> RemoteResult<()> {
        let mut params = track.params();
        if at_queue_beginning {
            params["insert_at_queue_beginning"] = json!(true);
        }
        self.call(method::ENQUEUE_TRACK, params).await?;
        Ok(())
    }

    pub async fn remove_from_queue(&self, track: TrackRef) -> RemoteResult<()> {
        self.call(method::REMOVE_FROM_QUEUE, track.params()).await?;
        Ok(())
    }

    pub async fn add_url_to_playlist(&self, playlist_id: PlaylistId, url: &str) -> RemoteResult<()> {
        let playlist_id = playlist_id.require_real()?;
        let parsed =
            reqwest::Url::parse(url).map_err(|_| ValidationError::BadUrl(url.to_string()))?;
        self.call(
            method::ADD_URL_TO_PLAYLIST,
            json!({ "playlist_id": playlist_id, "url": parsed.as_str() }),
        )
        .await?;
        Ok(())
    }

    // ── plugin ────────────────────────────────────────────────────────────────

    pub async fn plugin_capabilities(&self) -> RemoteResult<Capabilities> {
        self.call_as(method::PLUGIN_CAPABILITIES, json!({})).await
    }

    pub async fn version(&self) -> RemoteResult<VersionInfo> {
        self.call_as(method::VERSION, json!({})).await
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> RemoteResult<T> {
    serde_json::from_value(value).map_err(|e| RemoteError::malformed(method, e))
}

/// Wire shape of a page of entries.
#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    entries: Vec<Value>,
    total_entries_count: usize,
    #[serde(default)]
    count_of_found_entries: Option<usize>,
}

impl RawPage {
    /// Rows become tuples in requested-field order; object rows are reordered.
    fn normalize(self, fields: &[String]) -> RemoteResult<ListPage> {
        let entries = self
            .entries
            .into_iter()
            .map(|entry| match entry {
                Value::Array(row) => Ok(row),
                Value::Object(mut obj) => Ok(fields
                    .iter()
                    .map(|f| obj.remove(f).unwrap_or(Value::Null))
                    .collect()),
                other => Err(RemoteError::malformed(
                    method::PLAYLIST_ENTRIES,
                    format!("entry is neither array nor object: {}", other),
                )),
            })
            .collect::<RemoteResult<Vec<_>>>()?;
        Ok(ListPage {
            entries,
            total_count: self.total_entries_count,
            filtered_count: self
                .count_of_found_entries
                .unwrap_or(self.total_entries_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remote_proto::protocol::PageWindow;
    use std::sync::Mutex;

    type Reply = Box<dyn Fn(&str, &Value) -> RemoteResult<Value> + Send + Sync>;

    struct Recorder {
        calls: Mutex<Vec<(String, Value, CallMode)>>,
        reply: Reply,
    }

    impl Recorder {
        fn new(reply: impl Fn(&str, &Value) -> RemoteResult<Value> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Box::new(reply),
            })
        }

        fn calls(&self) -> Vec<(String, Value, CallMode)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn call(&self, method: &str, params: Value, mode: CallMode) -> RemoteResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.clone(), mode));
            (self.reply)(method, &params)
        }
    }

    fn track(t: i64, p: i64) -> TrackRef {
        TrackRef::new(TrackId(t), PlaylistId(p)).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_transport() {
        let recorder = Recorder::new(|_, _| Ok(json!({})));
        let rpc = RpcClient::new(recorder.clone());
        let request = ListRequest::first_page(&[], 25).unwrap();

        let err = rpc
            .playlist_entries(PlaylistId::SENTINEL, &request)
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::InvalidArgument(ValidationError::SentinelPlaylist));

        assert!(rpc.set_track_position(-4.0).await.is_err());
        assert!(rpc.set_track_position(f64::NAN).await.is_err());
        assert!(matches!(
            rpc.add_url_to_playlist(PlaylistId(2), "not a url").await,
            Err(RemoteError::InvalidArgument(ValidationError::BadUrl(_)))
        ));
        assert!(rpc
            .locate_entry(PlaylistId(0), &request, TrackId(1))
            .await
            .is_err());
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_uses_long_poll() {
        let recorder = Recorder::new(|_, params| {
            assert_eq!(params["event"], "playlists_content_change");
            Ok(json!({ "playlists_changed": false }))
        });
        let rpc = RpcClient::new(recorder.clone());
        let push = rpc.subscribe(Topic::PlaylistContentChange).await.unwrap();
        assert_eq!(push.topic(), Topic::PlaylistContentChange);
        let calls = recorder.calls();
        assert_eq!(calls[0].0, method::SUBSCRIBE);
        assert_eq!(calls[0].2, CallMode::LongPoll);
    }

    #[tokio::test]
    async fn test_object_rows_are_normalized_to_tuples() {
        let recorder = Recorder::new(|_, _| {
            Ok(json!({
                "entries": [
                    { "title": "B", "id": 2 },
                    { "id": 3, "title": "C" }
                ],
                "total_entries_count": 40
            }))
        });
        let rpc = RpcClient::new(recorder);
        let request = ListRequest::first_page(&["title".to_string()], 25).unwrap();
        let page = rpc.playlist_entries(PlaylistId(1), &request).await.unwrap();
        assert_eq!(page.entries, vec![vec![json!(2), json!("B")], vec![json!(3), json!("C")]]);
        assert_eq!(page.total_count, 40);
        assert_eq!(page.filtered_count, 40);
    }

    #[tokio::test]
    async fn test_locate_sends_request_and_track() {
        let recorder = Recorder::new(|_, _| Ok(json!({ "page_number": 2, "track_index_on_page": 5 })));
        let rpc = RpcClient::new(recorder.clone());
        let mut request = ListRequest::first_page(&[], 25).unwrap();
        request.window = PageWindow::new(0, 25).unwrap();
        request.search = "x".into();

        let location = rpc
            .locate_entry(PlaylistId(7), &request, TrackId(42))
            .await
            .unwrap();
        assert_eq!(
            location,
            Some(EntryLocation {
                page_number: 2,
                index_on_page: 5
            })
        );
        let calls = recorder.calls();
        let (name, params, _) = &calls[0];
        assert_eq!(name, method::ENTRY_POSITION);
        assert_eq!(params["track_id"], 42);
        assert_eq!(params["playlist_id"], 7);
        assert_eq!(params["search_string"], "x");
    }

    #[tokio::test]
    async fn test_mode_getter_and_setter() {
        let recorder = Recorder::new(|_, params| {
            let on = params.get("shuffle_on").and_then(Value::as_bool).unwrap_or(false);
            Ok(json!({ "shuffle_mode_on": on }))
        });
        let rpc = RpcClient::new(recorder.clone());
        assert!(rpc.shuffle(Some(true)).await.unwrap());
        assert!(!rpc.shuffle(None).await.unwrap());
        let calls = recorder.calls();
        assert_eq!(calls[0].1, json!({ "shuffle_on": true }));
        assert_eq!(calls[1].1, json!({}));
    }

    #[tokio::test]
    async fn test_play_specific_track_and_resume() {
        let recorder = Recorder::new(|_, _| Ok(json!({ "playback_state": "playing" })));
        let rpc = RpcClient::new(recorder.clone());
        assert_eq!(rpc.play(Some(track(42, 7))).await.unwrap(), PlaybackState::Playing);
        assert_eq!(rpc.play(None).await.unwrap(), PlaybackState::Playing);
        let calls = recorder.calls();
        assert_eq!(calls[0].1, json!({ "track_id": 42, "playlist_id": 7 }));
        assert_eq!(calls[1].1, json!({}));
    }

    #[tokio::test]
    async fn test_application_error_passes_through() {
        let recorder = Recorder::new(|_, _| {
            Err(RemoteError::Application {
                code: 5,
                message: "Specified track does not exist.".into(),
            })
        });
        let rpc = RpcClient::new(recorder);
        let err = rpc.track_info(track(1, 1)).await.unwrap_err();
        assert_eq!(err.code(), Some(5));
        assert_eq!(err.user_message(), "Specified track does not exist.");
    }

    #[tokio::test]
    async fn test_missing_field_is_malformed() {
        let recorder = Recorder::new(|_, _| Ok(json!({})));
        let rpc = RpcClient::new(recorder);
        assert!(matches!(
            rpc.volume(None).await,
            Err(RemoteError::MalformedResponse { .. })
        ));
    }
}
