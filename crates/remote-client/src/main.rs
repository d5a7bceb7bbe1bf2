mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use remote_client::core::{Frontend, RemoteSession};
use remote_client::list_tracker::ListView;
use remote_client::mirror::StateObserver;
use remote_client::progress::TrackProgress;
use remote_client::{HttpTransport, RemoteError, RpcClient};
use remote_proto::config::Config;
use remote_proto::format::{format_file_size, format_time};
use remote_proto::protocol::{
    download_path, ControlPanelState, ListPage, ListRequest, PageWindow, Playlist, PlaylistId,
    Rating, SortDirection, SortSpec, TrackInfo, TrackRef, Volume,
};

use cli::{Args, Command};

const LOG_FILTER: &str = "info,hyper_util=warn,reqwest=warn,hyper=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let watching = matches!(args.command, Command::Watch { .. });

    // Allow RUST_LOG override; keep HTTP client internals quiet.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| LOG_FILTER.to_string());
    if watching {
        let data_dir = remote_proto::platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let log_path = data_dir.join("player-remote.log");
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_env_filter(log_filter.as_str())
            .with_ansi(false)
            .init();
        eprintln!("player-remote log: {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(log_filter.as_str())
            .init();
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: {}; using defaults", e);
            Config::default()
        }),
    };
    if let Some(url) = args.url {
        config.server.url = url;
    }

    let transport = HttpTransport::new(&config.server)?;
    tracing::debug!("rpc endpoint: {}", transport.endpoint());
    let rpc = RpcClient::new(Arc::new(transport));

    run_command(args.command, &rpc, &config).await
}

async fn run_command(command: Command, rpc: &RpcClient, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Watch {
            playlist,
            track_info,
        } => watch(rpc.clone(), config, playlist, track_info).await?,
        Command::State => print_state(&rpc.control_panel_state().await?),
        Command::Play { playlist, track } => {
            let target = match (playlist, track) {
                (Some(playlist), Some(track)) => Some(TrackRef::new(track, playlist)?),
                _ => None,
            };
            println!("{:?}", rpc.play(target).await?);
        }
        Command::Pause => println!("{:?}", rpc.pause().await?),
        Command::Stop => println!("{:?}", rpc.stop().await?),
        Command::Next => {
            let source = rpc.play_next().await?;
            println!("playlist {} track {}", source.playlist_id, source.track_id);
        }
        Command::Prev => {
            let source = rpc.play_previous().await?;
            println!("playlist {} track {}", source.playlist_id, source.track_id);
        }
        Command::Volume { level } => {
            let level = level.map(Volume::new).transpose()?;
            println!("{}", rpc.volume(level).await?.level());
        }
        Command::Mute { state } => print_mode(rpc.mute(state.map(|s| s.as_bool())).await?),
        Command::Shuffle { state } => {
            print_mode(rpc.shuffle(state.map(|s| s.as_bool())).await?)
        }
        Command::Repeat { state } => print_mode(rpc.repeat(state.map(|s| s.as_bool())).await?),
        Command::RadioCapture { state } => {
            print_mode(rpc.radio_capture(state.map(|s| s.as_bool())).await?)
        }
        Command::Seek { seconds } => rpc.set_track_position(seconds).await?,
        Command::Rating { track, value } => {
            let track = track.track_ref()?;
            if let Some(value) = value {
                rpc.set_track_rating(track, Rating::new(value)?).await?;
            }
            println!("{}", rpc.track_info(track).await?.rating.value());
        }
        Command::Info { track } => print_info(&rpc.track_info(track.track_ref()?).await?),
        Command::Title { track, format } => {
            let format = format.unwrap_or_else(|| config.view.title_format.clone());
            println!(
                "{}",
                rpc.formatted_track_title(track.track_ref()?, &format).await?
            );
        }
        Command::Cover {
            track,
            width,
            height,
        } => {
            let size = width.zip(height);
            let uri = rpc.cover_uri(track.track_ref()?, size).await?;
            if uri.starts_with("http://") || uri.starts_with("https://") {
                println!("{}", uri);
            } else {
                println!("{}", config.server.resolve(&uri));
            }
        }
        Command::Playlists => {
            for playlist in rpc.playlists(&["entries_count", "duration", "size"]).await? {
                print_playlist(&playlist);
            }
        }
        Command::Entries {
            playlist,
            page,
            search,
            sort,
            desc,
        } => {
            let mut request =
                ListRequest::first_page(&config.view.entry_fields, config.view.page_length)?;
            request.window = PageWindow::page(page, config.view.page_length)?;
            request.search = search.unwrap_or_default();
            request.sort = sort.map(|field| SortSpec {
                field,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
            });
            let page = rpc.playlist_entries(playlist, &request).await?;
            print_page(&request, &page, None);
        }
        Command::Locate { track } => {
            let request =
                ListRequest::first_page(&config.view.entry_fields, config.view.page_length)?;
            match rpc
                .locate_entry(track.playlist, &request, track.track)
                .await?
            {
                Some(location) => println!(
                    "page {} row {}",
                    location.page_number, location.index_on_page
                ),
                None => println!("not found"),
            }
        }
        Command::Enqueue { track, front } => {
            rpc.enqueue_track(track.track_ref()?, front).await?
        }
        Command::Dequeue { track } => rpc.remove_from_queue(track.track_ref()?).await?,
        Command::AddUrl { playlist, url } => rpc.add_url_to_playlist(playlist, &url).await?,
        Command::Capabilities => {
            let caps = rpc.plugin_capabilities().await?;
            println!("upload_track: {}", caps.upload_track);
            println!("physical_track_deletion: {}", caps.physical_track_deletion);
            println!("scheduler: {}", caps.scheduler);
        }
        Command::Version => {
            let version = rpc.version().await?;
            println!("player {}", version.player_version);
            println!("plugin {}", version.plugin_version);
        }
        Command::DownloadUrl { track } => {
            println!(
                "{}",
                config.server.resolve(&download_path(track.track_ref()?))
            );
        }
    }
    Ok(())
}

// ── watch mode ────────────────────────────────────────────────────────────────

async fn watch(
    rpc: RpcClient,
    config: &Config,
    playlist: Option<PlaylistId>,
    track_info: bool,
) -> anyhow::Result<()> {
    let playlist = match playlist {
        Some(playlist) => playlist,
        None => current_or_first_playlist(&rpc).await?,
    };

    let session = RemoteSession::start(rpc, config, Box::new(PrintFrontend { track_info }));
    session.handle.observe_state(Box::new(StatePrinter::default())).await?;
    session
        .handle
        .open_list(playlist, Some(Box::new(PrintListView::default())), None)
        .await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("watch: interrupted");
    session.shutdown().await;
    Ok(())
}

async fn current_or_first_playlist(rpc: &RpcClient) -> anyhow::Result<PlaylistId> {
    let state = rpc.control_panel_state().await?;
    if !state.playlist_id.is_sentinel() {
        return Ok(state.playlist_id);
    }
    rpc.playlists(&[])
        .await?
        .first()
        .map(|p| p.id)
        .context("the player has no playlists")
}

struct PrintFrontend {
    track_info: bool,
}

impl Frontend for PrintFrontend {
    fn playlists_loaded(&mut self, playlists: &[Playlist]) {
        println!("── {} playlists", playlists.len());
    }

    fn now_playing(&mut self, title: Option<&str>) {
        match title {
            Some(title) => println!("▶ {}", title),
            None => println!("■"),
        }
    }

    fn track_progress(&mut self, progress: &TrackProgress) {
        if let Some(hint) = progress.hint() {
            tracing::debug!("progress {}", hint);
        }
    }

    fn notify(&mut self, context: &str, error: &RemoteError) {
        eprintln!("{}: {}", context, error.user_message());
    }

    fn wants_track_info(&self) -> bool {
        self.track_info
    }

    fn track_info(&mut self, info: &TrackInfo) {
        print_info(info);
    }
}

#[derive(Default)]
struct StatePrinter {
    last: Option<(remote_proto::protocol::PlaybackState, u8, bool, bool)>,
}

impl StateObserver for StatePrinter {
    fn state_replaced(&mut self, state: &Arc<ControlPanelState>) {
        let summary = (
            state.playback_state,
            state.volume,
            state.shuffle_on,
            state.repeat_on,
        );
        if self.last != Some(summary) {
            self.last = Some(summary);
            print_state(state);
        }
    }
}

#[derive(Default)]
struct PrintListView {
    request: Option<ListRequest>,
    page: ListPage,
}

impl ListView for PrintListView {
    fn show_page(&mut self, request: &ListRequest, page: &ListPage) {
        self.request = Some(request.clone());
        self.page = page.clone();
        print_page(request, page, None);
    }

    fn set_highlight(&mut self, row: Option<usize>) {
        if let (Some(request), Some(row)) = (&self.request, row) {
            print_page(request, &self.page, Some(row));
        }
    }
}

// ── printing ──────────────────────────────────────────────────────────────────

fn print_mode(on: bool) {
    println!("{}", if on { "on" } else { "off" });
}

fn print_state(state: &ControlPanelState) {
    println!(
        "{:?} playlist {} track {} volume {}{}{}{}",
        state.playback_state,
        state.playlist_id,
        state.track_id,
        state.volume,
        if state.mute_on { " muted" } else { "" },
        if state.shuffle_on { " shuffle" } else { "" },
        if state.repeat_on { " repeat" } else { "" },
    );
}

fn print_playlist(playlist: &Playlist) {
    let mut line = format!("{:>6}  {}", playlist.id, playlist.title);
    if let Some(count) = playlist.entries_count {
        line.push_str(&format!("  ({} entries", count));
        if let Some(duration) = playlist.duration {
            line.push_str(&format!(", {}", format_time(duration)));
        }
        if let Some(size) = playlist.size {
            line.push_str(&format!(", {}", format_file_size(size)));
        }
        line.push(')');
    }
    println!("{}", line);
}

fn print_info(info: &TrackInfo) {
    let fields = [
        ("title", info.title.clone()),
        ("artist", info.artist.clone()),
        ("album", info.album.clone()),
        ("date", info.date.clone()),
        ("genre", info.genre.clone()),
        ("bitrate", info.bitrate.map(|b| format!("{} kbps", b))),
        ("duration", info.duration.map(format_time)),
        ("filesize", info.filesize.map(format_file_size)),
        ("filename", info.filename.clone()),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            println!("{:>9}: {}", name, value);
        }
    }
    println!("{:>9}: {}", "rating", info.rating.value());
}

fn print_page(request: &ListRequest, page: &ListPage, highlight: Option<usize>) {
    println!(
        "── page {} ({} of {} entries)",
        request.window.page_number(),
        page.filtered_count,
        page.total_count
    );
    for (row, entry) in page.entries.iter().enumerate() {
        let marker = if highlight == Some(row) { '▶' } else { ' ' };
        let cells: Vec<String> = entry
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{} {}", marker, cells.join("  "));
    }
}
