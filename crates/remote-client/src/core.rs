/// RemoteCore: single-owner event loop for all client-side state.
///
/// The state mirror, control-menu registry, list tracker and track progress
/// live here and nowhere else.  Subscription loops, page-fetch tasks, the
/// progress ticker and the embedding frontend only send `CoreEvent`s.
///
/// Every control-panel push runs the same sequence on one snapshot:
/// mirror replace (observers) → now-playing title → menu notifiers →
/// list reconciliation.  The push is acknowledged only after the whole
/// sequence has finished, which is what lets its topic re-arm.
use std::sync::Arc;
use std::time::Duration;

use remote_proto::config::{Config, ViewConfig};
use remote_proto::protocol::{
    ControlPanelState, ListPage, ListRequest, Playlist, PlaylistId, Push, Topic, TrackInfo,
    TrackRef,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::list_tracker::{ListTracker, ListView, PageFetch, Plan};
use crate::menu::{ControlMenuDescriptor, MenuKey, MenuNotifier, MenuRegistry};
use crate::mirror::{StateMirror, StateObserver};
use crate::progress::TrackProgress;
use crate::rpc::RpcClient;
use crate::subscription;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const PLAYLIST_FIELDS: [&str; 3] = ["entries_count", "duration", "size"];

/// Where the core reports things meant for the user.
pub trait Frontend: Send {
    fn playlists_loaded(&mut self, playlists: &[Playlist]);
    fn now_playing(&mut self, title: Option<&str>);
    fn track_progress(&mut self, progress: &TrackProgress);
    /// Transient, non-blocking notice.
    fn notify(&mut self, context: &str, error: &RemoteError);

    /// True while a track-info display is open.  The core then refreshes it
    /// with the playing track on every control-panel push.
    fn wants_track_info(&self) -> bool {
        false
    }

    fn track_info(&mut self, _info: &TrackInfo) {}
}

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the RemoteCore loop.
pub enum CoreEvent {
    /// A push from a subscription loop; `done` releases the loop to re-arm.
    Push {
        push: Push,
        done: oneshot::Sender<()>,
    },
    SubscriptionFailed {
        topic: Topic,
        error: RemoteError,
    },
    /// A page fetch task finished.
    PageFetched {
        fetch: PageFetch,
        result: RemoteResult<ListPage>,
    },
    /// Open a playlist view.  `None` requests the configured first page.
    OpenList {
        playlist_id: PlaylistId,
        view: Option<Box<dyn ListView>>,
        request: Option<ListRequest>,
    },
    CloseList(PlaylistId),
    /// User paging, sorting or searching.
    RequestPage {
        playlist_id: PlaylistId,
        request: ListRequest,
    },
    OpenMenu {
        descriptor: Arc<ControlMenuDescriptor>,
        notifier: MenuNotifier,
    },
    CloseMenu(MenuKey),
    ObserveState(Box<dyn StateObserver>),
    Reconcile {
        force: bool,
    },
    ProgressTick,
    Shutdown,
}

// ── RemoteCore ────────────────────────────────────────────────────────────────

pub struct RemoteCore {
    rpc: RpcClient,
    view: ViewConfig,
    mirror: StateMirror,
    menus: MenuRegistry,
    lists: ListTracker,
    progress: TrackProgress,
    frontend: Box<dyn Frontend>,
    /// Channel page-fetch tasks report back on.
    events_tx: mpsc::Sender<CoreEvent>,
    last_tick: Instant,
}

impl RemoteCore {
    pub fn new(
        rpc: RpcClient,
        view: ViewConfig,
        frontend: Box<dyn Frontend>,
        events_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        Self {
            rpc,
            view,
            mirror: StateMirror::new(),
            menus: MenuRegistry::new(),
            lists: ListTracker::new(),
            progress: TrackProgress::default(),
            frontend,
            events_tx,
            last_tick: Instant::now(),
        }
    }

    /// Run the core event loop.  Returns on `Shutdown`, cancellation, or
    /// when every sender is gone.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<CoreEvent>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        info!("RemoteCore: starting event loop");

        let tick_tx = self.events_tx.clone();
        let tick_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick_cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if tick_tx.send(CoreEvent::ProgressTick).await.is_err() {
                    break;
                }
            }
        });

        self.initial_sync().await;

        loop {
            let evt = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("RemoteCore: cancelled");
                    break;
                }
                evt = event_rx.recv() => evt,
            };
            let Some(evt) = evt else {
                info!("RemoteCore: event channel closed, shutting down");
                break;
            };
            match evt {
                CoreEvent::Shutdown => {
                    info!("RemoteCore: shutdown requested");
                    break;
                }
                CoreEvent::Push { push, done } => {
                    self.handle_push(push).await;
                    let _ = done.send(());
                }
                CoreEvent::SubscriptionFailed { topic, error } => {
                    self.frontend
                        .notify(&format!("subscription {}", topic), &error);
                }
                CoreEvent::PageFetched { fetch, result } => {
                    self.handle_page(fetch, result).await;
                }
                CoreEvent::OpenList {
                    playlist_id,
                    view,
                    request,
                } => self.open_list(playlist_id, view, request),
                CoreEvent::CloseList(playlist_id) => {
                    if self.lists.detach(playlist_id) {
                        debug!("RemoteCore: closed playlist {}", playlist_id);
                    }
                }
                CoreEvent::RequestPage {
                    playlist_id,
                    request,
                } => {
                    if let Some(fetch) = self.lists.request_page(playlist_id, request) {
                        self.spawn_fetch(fetch);
                    }
                }
                CoreEvent::OpenMenu {
                    descriptor,
                    notifier,
                } => self.menus.register(descriptor, notifier),
                CoreEvent::CloseMenu(key) => {
                    self.menus.unregister(&key);
                }
                CoreEvent::ObserveState(observer) => self.mirror.subscribe(observer),
                CoreEvent::Reconcile { force } => self.reconcile(force).await,
                CoreEvent::ProgressTick => {
                    let now = Instant::now();
                    let elapsed = now - self.last_tick;
                    self.last_tick = now;
                    if self.progress.tick(elapsed) {
                        self.frontend.track_progress(&self.progress);
                    }
                }
            }
        }

        info!("RemoteCore: stopped");
        Ok(())
    }

    async fn initial_sync(&mut self) {
        self.reload_playlists().await;
        match self.rpc.control_panel_state().await {
            Ok(state) => self.replace_state(state, true).await,
            Err(e) => {
                warn!("RemoteCore: initial state: {}", e);
                self.frontend.notify("reading player state", &e);
            }
        }
    }

    // ── pushes ────────────────────────────────────────────────────────────────

    async fn handle_push(&mut self, push: Push) {
        match push {
            Push::ControlPanel(state) => {
                if state.app_exiting {
                    info!("RemoteCore: player is shutting down");
                }
                self.replace_state(state, false).await;
            }
            Push::Position(update) => {
                self.progress.apply_update(&update);
                self.last_tick = Instant::now();
                self.frontend.track_progress(&self.progress);
            }
            Push::PlaylistsContent(change) => {
                if change.playlists_changed {
                    self.reload_playlists().await;
                }
                self.refresh_open_lists();
            }
        }
    }

    async fn replace_state(&mut self, state: ControlPanelState, force: bool) {
        let state = self.mirror.replace(state);
        self.progress.apply_state(&state);
        self.last_tick = Instant::now();
        self.frontend.track_progress(&self.progress);
        self.update_now_playing(&state).await;
        self.menus.notify_all(&state);
        self.reconcile(force).await;
    }

    async fn update_now_playing(&mut self, state: &ControlPanelState) {
        if !state.is_playing() {
            self.frontend.now_playing(None);
            return;
        }
        let Some(playlist_id) = self.lists.resolve(state.playlist_id) else {
            return;
        };
        let track = match TrackRef::new(state.track_id, playlist_id) {
            Ok(track) => track,
            Err(e) => {
                debug!("RemoteCore: no track to title: {}", e);
                return;
            }
        };
        match self
            .rpc
            .formatted_track_title(track, &self.view.title_format)
            .await
        {
            Ok(title) => self.frontend.now_playing(Some(&title)),
            Err(e) => warn!("RemoteCore: formatted title for {:?}: {}", track, e),
        }

        if self.frontend.wants_track_info() {
            match self.rpc.track_info(track).await {
                Ok(info) => self.frontend.track_info(&info),
                Err(e) => warn!("RemoteCore: track info for {:?}: {}", track, e),
            }
        }
    }

    async fn reload_playlists(&mut self) {
        match self.rpc.playlists(&PLAYLIST_FIELDS).await {
            Ok(playlists) => {
                let removed = self
                    .lists
                    .set_playlists(playlists.iter().map(|p| p.id).collect());
                if !removed.is_empty() {
                    info!("RemoteCore: playlists removed: {:?}", removed);
                }
                info!("RemoteCore: {} playlists", playlists.len());
                self.frontend.playlists_loaded(&playlists);
            }
            Err(e) => {
                warn!("RemoteCore: playlists: {}", e);
                self.frontend.notify("loading playlists", &e);
            }
        }
    }

    fn refresh_open_lists(&mut self) {
        for playlist_id in self.lists.open_lists() {
            let Some(request) = self.lists.request(playlist_id).cloned() else {
                continue;
            };
            if let Some(fetch) = self.lists.request_page(playlist_id, request) {
                self.spawn_fetch(fetch);
            }
        }
    }

    // ── lists ─────────────────────────────────────────────────────────────────

    fn open_list(
        &mut self,
        playlist_id: PlaylistId,
        view: Option<Box<dyn ListView>>,
        request: Option<ListRequest>,
    ) {
        let request = match request {
            Some(request) => Ok(request),
            None => ListRequest::first_page(&self.view.entry_fields, self.view.page_length),
        };
        let result = request.and_then(|request| {
            playlist_id.require_real()?;
            Ok(request)
        });
        match result {
            Ok(request) => {
                let fetch = self.lists.attach(playlist_id, view, request);
                self.spawn_fetch(fetch);
            }
            Err(e) => self.frontend.notify("opening playlist", &e.into()),
        }
    }

    fn spawn_fetch(&self, fetch: PageFetch) {
        debug!(
            "RemoteCore: fetching playlist {} from {} (gen {})",
            fetch.playlist_id, fetch.request.window.start, fetch.generation
        );
        let rpc = self.rpc.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = rpc.playlist_entries(fetch.playlist_id, &fetch.request).await;
            let _ = tx.send(CoreEvent::PageFetched { fetch, result }).await;
        });
    }

    async fn handle_page(&mut self, fetch: PageFetch, result: RemoteResult<ListPage>) {
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.lists.fail_fetch(&fetch);
                warn!("RemoteCore: playlist {} page: {}", fetch.playlist_id, e);
                self.frontend.notify("loading playlist", &e);
                return;
            }
        };
        match self.lists.complete_fetch(&fetch, &page) {
            Ok(outcome) => {
                if let Some(force) = outcome.deferred {
                    self.reconcile(force).await;
                } else if !outcome.highlighted && self.is_current_playlist(fetch.playlist_id) {
                    // Follow the user's paging.
                    self.reconcile(false).await;
                }
            }
            Err(e) => debug!("RemoteCore: dropping {}", e),
        }
    }

    fn is_current_playlist(&self, playlist_id: PlaylistId) -> bool {
        let state = self.mirror.current();
        !state.is_stopped() && self.lists.resolve(state.playlist_id) == Some(playlist_id)
    }

    /// Keeps the current track highlighted in the open lists.
    async fn reconcile(&mut self, force: bool) {
        let state = self.mirror.current();
        let query = match self.lists.plan(&state, force) {
            Plan::Idle => return,
            Plan::Load(fetch) => {
                self.spawn_fetch(fetch);
                return;
            }
            Plan::Locate(query) => query,
        };

        let location = match self
            .rpc
            .locate_entry(query.playlist_id, &query.request, query.track_id)
            .await
        {
            Ok(location) => location,
            Err(e) => {
                warn!(
                    "RemoteCore: locating track {} in playlist {}: {}",
                    query.track_id, query.playlist_id, e
                );
                self.lists.clear(query.playlist_id);
                return;
            }
        };
        match self.lists.apply_location(&query, location) {
            Ok(Some(fetch)) => self.spawn_fetch(fetch),
            Ok(None) => {}
            Err(e @ RemoteError::StaleResult(_)) => debug!("RemoteCore: dropping {}", e),
            Err(e) => warn!(
                "RemoteCore: placing track {} in playlist {}: {}",
                query.track_id, query.playlist_id, e
            ),
        }
    }
}

// ── CoreHandle ────────────────────────────────────────────────────────────────

/// Sending side for frontends.
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::Sender<CoreEvent>,
}

impl CoreHandle {
    pub fn new(tx: mpsc::Sender<CoreEvent>) -> Self {
        Self { tx }
    }

    async fn send(&self, evt: CoreEvent) -> anyhow::Result<()> {
        self.tx
            .send(evt)
            .await
            .map_err(|_| anyhow::anyhow!("core loop has stopped"))
    }

    pub async fn open_list(
        &self,
        playlist_id: PlaylistId,
        view: Option<Box<dyn ListView>>,
        request: Option<ListRequest>,
    ) -> anyhow::Result<()> {
        self.send(CoreEvent::OpenList {
            playlist_id,
            view,
            request,
        })
        .await
    }

    pub async fn close_list(&self, playlist_id: PlaylistId) -> anyhow::Result<()> {
        self.send(CoreEvent::CloseList(playlist_id)).await
    }

    pub async fn request_page(
        &self,
        playlist_id: PlaylistId,
        request: ListRequest,
    ) -> anyhow::Result<()> {
        self.send(CoreEvent::RequestPage {
            playlist_id,
            request,
        })
        .await
    }

    pub async fn open_menu(
        &self,
        descriptor: Arc<ControlMenuDescriptor>,
        notifier: MenuNotifier,
    ) -> anyhow::Result<()> {
        self.send(CoreEvent::OpenMenu {
            descriptor,
            notifier,
        })
        .await
    }

    pub async fn close_menu(&self, key: MenuKey) -> anyhow::Result<()> {
        self.send(CoreEvent::CloseMenu(key)).await
    }

    pub async fn observe_state(&self, observer: Box<dyn StateObserver>) -> anyhow::Result<()> {
        self.send(CoreEvent::ObserveState(observer)).await
    }

    pub async fn reconcile(&self, force: bool) -> anyhow::Result<()> {
        self.send(CoreEvent::Reconcile { force }).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(CoreEvent::Shutdown).await
    }
}

// ── session wiring ────────────────────────────────────────────────────────────

/// A running core plus its subscription loops.
pub struct RemoteSession {
    pub handle: CoreHandle,
    pub rpc: RpcClient,
    cancel: CancellationToken,
    core: JoinHandle<()>,
    subscriptions: Vec<JoinHandle<()>>,
}

impl RemoteSession {
    pub fn start(rpc: RpcClient, config: &Config, frontend: Box<dyn Frontend>) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(1024);
        let cancel = CancellationToken::new();

        let core = RemoteCore::new(rpc.clone(), config.view.clone(), frontend, event_tx.clone());
        let core_cancel = cancel.clone();
        let core = tokio::spawn(async move {
            if let Err(e) = core.run(event_rx, core_cancel).await {
                error!("RemoteCore exited with error: {}", e);
            }
        });

        let subscriptions = subscription::spawn_all(
            &rpc,
            &event_tx,
            config.subscriptions.resubscribe_delay(),
            &cancel,
        );

        Self {
            handle: CoreHandle::new(event_tx),
            rpc,
            cancel,
            core,
            subscriptions,
        }
    }

    /// Cancels every loop and waits for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        futures_util::future::join_all(self.subscriptions).await;
        let _ = self.core.await;
    }
}
