use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC method names exposed by the player plugin.
pub mod method {
    pub const CONTROL_PANEL_STATE: &str = "GetPlayerControlPanelState";
    pub const SUBSCRIBE: &str = "SubscribeOnAIMPStateUpdateEvent";
    pub const PLAYLISTS: &str = "GetPlaylists";
    pub const PLAYLIST_ENTRIES: &str = "GetPlaylistEntries";
    pub const PLAYLIST_ENTRIES_COUNT: &str = "GetPlaylistEntriesCount";
    pub const ENTRY_POSITION: &str = "GetEntryPositionInDataTable";
    pub const FORMATTED_TITLE: &str = "GetFormattedEntryTitle";
    pub const TRACK_INFO: &str = "GetPlaylistEntryInfo";
    pub const COVER: &str = "GetCover";
    pub const SET_TRACK_RATING: &str = "SetTrackRating";
    pub const PLAY: &str = "Play";
    pub const PAUSE: &str = "Pause";
    pub const STOP: &str = "Stop";
    pub const PLAY_PREVIOUS: &str = "PlayPrevious";
    pub const PLAY_NEXT: &str = "PlayNext";
    pub const VOLUME: &str = "VolumeLevel";
    pub const MUTE: &str = "Mute";
    pub const SHUFFLE: &str = "ShufflePlaybackMode";
    pub const REPEAT: &str = "RepeatPlaybackMode";
    pub const RADIO_CAPTURE: &str = "RadioCaptureMode";
    pub const TRACK_POSITION: &str = "TrackPosition";
    pub const ENQUEUE_TRACK: &str = "EnqueueTrack";
    pub const REMOVE_FROM_QUEUE: &str = "RemoveTrackFromPlayQueue";
    pub const ADD_URL_TO_PLAYLIST: &str = "AddURLToPlaylist";
    pub const PLUGIN_CAPABILITIES: &str = "PluginCapabilities";
    pub const VERSION: &str = "Version";
}

// ── ids & validated values ────────────────────────────────────────────────────

/// Local validation failures.  Raised before anything reaches the wire.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("'{value}' is not a valid {kind} id")]
    BadId { kind: &'static str, value: String },
    #[error("playlist id 0 does not name a playlist")]
    SentinelPlaylist,
    #[error("volume {0} is out of range [0, 100]")]
    VolumeOutOfRange(i64),
    #[error("rating {0} is out of range [0, 5]")]
    RatingOutOfRange(i64),
    #[error("invalid url '{0}'")]
    BadUrl(String),
    #[error("page length must be positive")]
    EmptyPage,
    #[error("page {page} of length {length} is out of range")]
    PageOutOfRange { page: usize, length: usize },
    #[error("track position {0} is not a valid offset")]
    BadPosition(f64),
}

/// Playlist identifier.  `0` is a sentinel the server uses for "no playlist".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub i64);

impl PlaylistId {
    pub const SENTINEL: PlaylistId = PlaylistId(0);

    pub fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    /// Rejects the sentinel; used wherever a real playlist is required.
    pub fn require_real(self) -> Result<Self, ValidationError> {
        if self.is_sentinel() {
            Err(ValidationError::SentinelPlaylist)
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlaylistId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id(s, "playlist").map(PlaylistId)
    }
}

/// Track (playlist entry) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id(s, "track").map(TrackId)
    }
}

fn parse_id(s: &str, kind: &'static str) -> Result<i64, ValidationError> {
    s.trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| ValidationError::BadId {
            kind,
            value: s.to_string(),
        })
}

/// A track inside a specific playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    pub track_id: TrackId,
    pub playlist_id: PlaylistId,
}

impl TrackRef {
    pub fn new(track_id: TrackId, playlist_id: PlaylistId) -> Result<Self, ValidationError> {
        Ok(Self {
            track_id,
            playlist_id: playlist_id.require_real()?,
        })
    }

    pub fn params(&self) -> Value {
        json!({ "track_id": self.track_id, "playlist_id": self.playlist_id })
    }
}

/// Volume level in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: u8 = 100;

    pub fn new(level: i64) -> Result<Self, ValidationError> {
        if (0..=Self::MAX as i64).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(ValidationError::VolumeOutOfRange(level))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

/// Track rating, 0 meaning "not set", 5 the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;
    pub const UNSET: Rating = Rating(0);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::RatingOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_set(self) -> bool {
        self.0 > 0
    }
}

// ── player state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// Full control-panel snapshot as pushed by the server.
///
/// A snapshot without `track_progress`/`track_length` means no track is
/// active; consumers must treat the position display as disabled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlPanelState {
    pub playback_state: PlaybackState,
    #[serde(default)]
    pub playlist_id: PlaylistId,
    #[serde(default)]
    pub track_id: TrackId,
    #[serde(default)]
    pub volume: u8,
    #[serde(rename = "shuffle_mode_on", default)]
    pub shuffle_on: bool,
    #[serde(rename = "repeat_mode_on", default)]
    pub repeat_on: bool,
    #[serde(rename = "mute_mode_on", default)]
    pub mute_on: bool,
    #[serde(rename = "radio_capture_mode_on", default)]
    pub radio_capture_on: bool,
    #[serde(rename = "track_progress", default, skip_serializing_if = "Option::is_none")]
    pub track_position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_length: Option<f64>,
    /// Set on the last push before the player shuts down.
    #[serde(rename = "aimp_app_is_exiting", default, skip_serializing_if = "is_false")]
    pub app_exiting: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl ControlPanelState {
    pub fn is_playing(&self) -> bool {
        self.playback_state == PlaybackState::Playing
    }

    pub fn is_stopped(&self) -> bool {
        self.playback_state == PlaybackState::Stopped
    }

    pub fn has_position(&self) -> bool {
        self.track_position.is_some()
    }
}

/// Position-only delta from the `play_state_change` topic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub playback_state: PlaybackState,
    #[serde(rename = "track_progress", default, skip_serializing_if = "Option::is_none")]
    pub track_position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_length: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistsChange {
    #[serde(default)]
    pub playlists_changed: bool,
}

/// Result of play-next / play-previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayingSource {
    #[serde(default)]
    pub playlist_id: PlaylistId,
    #[serde(default)]
    pub track_id: TrackId,
}

// ── subscriptions ─────────────────────────────────────────────────────────────

/// Push topics.  One long-poll subscription is kept alive per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ControlPanelChange,
    TrackPositionChange,
    PlaylistContentChange,
}

impl Topic {
    pub const ALL: [Topic; 3] = [
        Topic::ControlPanelChange,
        Topic::TrackPositionChange,
        Topic::PlaylistContentChange,
    ];

    /// Event id sent as the `event` parameter of the subscribe call.
    pub fn event_name(self) -> &'static str {
        match self {
            Topic::ControlPanelChange => "control_panel_state_change",
            Topic::TrackPositionChange => "play_state_change",
            Topic::PlaylistContentChange => "playlists_content_change",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A decoded server push.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    ControlPanel(ControlPanelState),
    Position(PositionUpdate),
    PlaylistsContent(PlaylistsChange),
}

impl Push {
    pub fn decode(topic: Topic, result: Value) -> Result<Self, serde_json::Error> {
        Ok(match topic {
            Topic::ControlPanelChange => Push::ControlPanel(serde_json::from_value(result)?),
            Topic::TrackPositionChange => Push::Position(serde_json::from_value(result)?),
            Topic::PlaylistContentChange => Push::PlaylistsContent(serde_json::from_value(result)?),
        })
    }

    pub fn topic(&self) -> Topic {
        match self {
            Push::ControlPanel(_) => Topic::ControlPanelChange,
            Push::Position(_) => Topic::TrackPositionChange,
            Push::PlaylistsContent(_) => Topic::PlaylistContentChange,
        }
    }
}

// ── paginated lists ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(rename = "dir")]
    pub direction: SortDirection,
}

/// Window of rows shown by a paginated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub start: usize,
    pub length: usize,
}

impl PageWindow {
    pub fn new(start: usize, length: usize) -> Result<Self, ValidationError> {
        if length == 0 {
            return Err(ValidationError::EmptyPage);
        }
        Ok(Self { start, length })
    }

    /// Window showing page `page` (zero based).
    pub fn page(page: usize, length: usize) -> Result<Self, ValidationError> {
        let start = page
            .checked_mul(length)
            .ok_or(ValidationError::PageOutOfRange { page, length })?;
        Self::new(start, length)
    }

    pub fn page_number(&self) -> usize {
        self.start / self.length.max(1)
    }
}

/// Parameters of the last page fetch issued for one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub fields: Vec<String>,
    pub sort: Option<SortSpec>,
    pub window: PageWindow,
    pub search: String,
}

impl ListRequest {
    /// First page, unsorted and unfiltered.  `id` is always the first field.
    pub fn first_page(entry_fields: &[String], page_length: usize) -> Result<Self, ValidationError> {
        let mut fields = vec!["id".to_string()];
        fields.extend(entry_fields.iter().filter(|f| f.as_str() != "id").cloned());
        Ok(Self {
            fields,
            sort: None,
            window: PageWindow::new(0, page_length)?,
            search: String::new(),
        })
    }

    pub fn params(&self, playlist_id: PlaylistId) -> Value {
        let order_fields: Vec<&SortSpec> = self.sort.iter().collect();
        json!({
            "playlist_id": playlist_id,
            "fields": self.fields,
            "order_fields": order_fields,
            "start_index": self.window.start,
            "entries_count": self.window.length,
            "search_string": self.search,
        })
    }
}

/// One page of a playlist as returned by the server.  Rows are tuples in the
/// order of the requested fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListPage {
    pub entries: Vec<Vec<Value>>,
    pub total_count: usize,
    pub filtered_count: usize,
}

/// Where a track sits inside the current sort/filter representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub page_number: usize,
    pub index_on_page: usize,
}

/// Wire form of the entry position lookup; `-1` in either field = not found.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawEntryLocation {
    pub page_number: i64,
    pub track_index_on_page: i64,
}

impl RawEntryLocation {
    pub fn into_location(self) -> Option<EntryLocation> {
        if self.page_number < 0 || self.track_index_on_page < 0 {
            return None;
        }
        Some(EntryLocation {
            page_number: self.page_number as usize,
            index_on_page: self.track_index_on_page as usize,
        })
    }
}

// ── catalogue ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackInfo {
    #[serde(default)]
    pub id: TrackId,
    #[serde(default)]
    pub playlist_id: PlaylistId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// kbit/s
    #[serde(default)]
    pub bitrate: Option<u64>,
    /// milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// bytes
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub upload_track: bool,
    #[serde(default)]
    pub physical_track_deletion: bool,
    #[serde(default)]
    pub scheduler: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "aimp_version", default)]
    pub player_version: String,
    #[serde(default)]
    pub plugin_version: String,
}

/// Path of the out-of-band track download handler, relative to the server root.
pub fn download_path(track: TrackRef) -> String {
    format!(
        "/downloadTrack/playlist_id/{}/track_id/{}",
        track.playlist_id, track.track_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_panel_state_from_wire() {
        let raw = json!({
            "playback_state": "playing",
            "playlist_id": 7,
            "track_id": 42,
            "volume": 55,
            "shuffle_mode_on": true,
            "repeat_mode_on": false,
            "mute_mode_on": false,
            "radio_capture_mode_on": true,
            "track_progress": 12,
            "track_length": 240
        });
        let state: ControlPanelState = serde_json::from_value(raw).unwrap();
        assert!(state.is_playing());
        assert_eq!(state.playlist_id, PlaylistId(7));
        assert_eq!(state.track_id, TrackId(42));
        assert!(state.shuffle_on);
        assert!(state.radio_capture_on);
        assert_eq!(state.track_position, Some(12.0));
        assert_eq!(state.track_length, Some(240.0));
        assert!(!state.app_exiting);
    }

    #[test]
    fn test_state_without_position_has_no_track() {
        let raw = json!({ "playback_state": "stopped", "volume": 10 });
        let state: ControlPanelState = serde_json::from_value(raw).unwrap();
        assert!(state.is_stopped());
        assert!(!state.has_position());
        assert_eq!(state.track_length, None);
        assert!(state.playlist_id.is_sentinel());
    }

    #[test]
    fn test_push_decode_by_topic() {
        let push = Push::decode(
            Topic::PlaylistContentChange,
            json!({ "playlists_changed": true }),
        )
        .unwrap();
        assert_eq!(
            push,
            Push::PlaylistsContent(PlaylistsChange {
                playlists_changed: true
            })
        );
        assert_eq!(push.topic(), Topic::PlaylistContentChange);

        let push = Push::decode(
            Topic::TrackPositionChange,
            json!({ "playback_state": "paused", "track_progress": 3 }),
        )
        .unwrap();
        match push {
            Push::Position(p) => {
                assert_eq!(p.playback_state, PlaybackState::Paused);
                assert_eq!(p.track_position, Some(3.0));
                assert_eq!(p.track_length, None);
            }
            other => panic!("unexpected push {:?}", other),
        }
    }

    #[test]
    fn test_id_parsing_fails_fast() {
        assert_eq!("17".parse::<PlaylistId>().unwrap(), PlaylistId(17));
        assert_eq!(" 5 ".parse::<TrackId>().unwrap(), TrackId(5));
        assert!("abc".parse::<TrackId>().is_err());
        assert!("-3".parse::<PlaylistId>().is_err());
        assert_eq!(
            TrackRef::new(TrackId(1), PlaylistId(0)),
            Err(ValidationError::SentinelPlaylist)
        );
    }

    #[test]
    fn test_rating_and_volume_bounds() {
        for r in 0..=5 {
            assert_eq!(Rating::new(r).unwrap().value(), r as u8);
        }
        assert!(!Rating::UNSET.is_set());
        assert_eq!(Rating::new(6), Err(ValidationError::RatingOutOfRange(6)));
        assert_eq!(Rating::new(-1), Err(ValidationError::RatingOutOfRange(-1)));
        assert_eq!(Volume::new(100).unwrap().level(), 100);
        assert_eq!(Volume::new(101), Err(ValidationError::VolumeOutOfRange(101)));
    }

    #[test]
    fn test_list_request_params() {
        let mut request =
            ListRequest::first_page(&["title".to_string(), "artist".to_string()], 25).unwrap();
        request.sort = Some(SortSpec {
            field: "artist".into(),
            direction: SortDirection::Descending,
        });
        request.window = PageWindow::page(2, 25).unwrap();
        request.search = "love".into();

        let params = request.params(PlaylistId(3));
        assert_eq!(params["playlist_id"], 3);
        assert_eq!(params["fields"], json!(["id", "title", "artist"]));
        assert_eq!(params["order_fields"], json!([{ "field": "artist", "dir": "desc" }]));
        assert_eq!(params["start_index"], 50);
        assert_eq!(params["entries_count"], 25);
        assert_eq!(params["search_string"], "love");
        assert_eq!(request.window.page_number(), 2);
    }

    #[test]
    fn test_unsorted_request_sends_empty_order() {
        let request = ListRequest::first_page(&[], 10).unwrap();
        assert_eq!(request.params(PlaylistId(1))["order_fields"], json!([]));
        assert!(PageWindow::new(0, 0).is_err());
    }

    #[test]
    fn test_page_window_overflow_is_rejected() {
        assert_eq!(
            PageWindow::page(usize::MAX / 2, 25),
            Err(ValidationError::PageOutOfRange {
                page: usize::MAX / 2,
                length: 25
            })
        );
        assert_eq!(PageWindow::page(usize::MAX, 1).unwrap().start, usize::MAX);
    }

    #[test]
    fn test_entry_location_not_found() {
        let raw: RawEntryLocation =
            serde_json::from_value(json!({ "page_number": -1, "track_index_on_page": -1 })).unwrap();
        assert_eq!(raw.into_location(), None);

        let raw: RawEntryLocation =
            serde_json::from_value(json!({ "page_number": 2, "track_index_on_page": 5 })).unwrap();
        assert_eq!(
            raw.into_location(),
            Some(EntryLocation {
                page_number: 2,
                index_on_page: 5
            })
        );
    }

    #[test]
    fn test_download_path() {
        let track = TrackRef::new(TrackId(42), PlaylistId(7)).unwrap();
        assert_eq!(download_path(track), "/downloadTrack/playlist_id/7/track_id/42");
    }
}
