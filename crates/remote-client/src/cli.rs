use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use remote_proto::protocol::{PlaylistId, TrackId, TrackRef, ValidationError};

/// player-remote - drive a media player's remote-control plugin
#[derive(Parser, Debug)]
#[command(name = "player-remote", version, about)]
pub struct Args {
    /// Config file (default: <config dir>/player-remote/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server URL, overrides [server].url
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow player pushes and show a live playlist page
    Watch {
        /// Playlist to show (default: the playing one)
        #[arg(long, short = 'p')]
        playlist: Option<PlaylistId>,
        /// Also print the playing track's details whenever the state changes
        #[arg(long)]
        track_info: bool,
    },
    /// Print the control-panel state
    State,
    /// Start playback; resumes the current track without arguments
    Play {
        #[arg(long, short = 'p', requires = "track")]
        playlist: Option<PlaylistId>,
        #[arg(long, short = 't', requires = "playlist")]
        track: Option<TrackId>,
    },
    Pause,
    Stop,
    Next,
    Prev,
    /// Read or set the volume (0-100)
    Volume { level: Option<i64> },
    Mute { state: Option<Toggle> },
    Shuffle { state: Option<Toggle> },
    Repeat { state: Option<Toggle> },
    RadioCapture { state: Option<Toggle> },
    /// Seek the current track to SECONDS
    Seek { seconds: f64 },
    /// Read or set a track's rating (0 clears it)
    Rating {
        #[command(flatten)]
        track: TrackArgs,
        value: Option<i64>,
    },
    /// Print a track's metadata
    Info {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Print a track's formatted title
    Title {
        #[command(flatten)]
        track: TrackArgs,
        /// Format string (default: [view].title_format)
        #[arg(long, short = 'f')]
        format: Option<String>,
    },
    /// Print the album cover URI
    Cover {
        #[command(flatten)]
        track: TrackArgs,
        #[arg(long, requires = "height")]
        width: Option<u32>,
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },
    /// List playlists
    Playlists,
    /// Print one page of a playlist
    Entries {
        #[arg(long, short = 'p')]
        playlist: PlaylistId,
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long)]
        search: Option<String>,
        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, requires = "sort")]
        desc: bool,
    },
    /// Print the page and row of a track in a playlist
    Locate {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Add a track to the play queue
    Enqueue {
        #[command(flatten)]
        track: TrackArgs,
        /// Insert at the head of the queue
        #[arg(long)]
        front: bool,
    },
    /// Remove a track from the play queue
    Dequeue {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Add a URL to a playlist
    AddUrl {
        #[arg(long, short = 'p')]
        playlist: PlaylistId,
        url: String,
    },
    Capabilities,
    Version,
    /// Print the download URL of a track
    DownloadUrl {
        #[command(flatten)]
        track: TrackArgs,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct TrackArgs {
    #[arg(long, short = 'p')]
    pub playlist: PlaylistId,
    #[arg(long, short = 't')]
    pub track: TrackId,
}

impl TrackArgs {
    pub fn track_ref(&self) -> Result<TrackRef, ValidationError> {
        TrackRef::new(self.track, self.playlist)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn as_bool(self) -> bool {
        self == Toggle::On
    }
}
