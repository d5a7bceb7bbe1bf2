#![allow(dead_code)]

pub mod stub_server;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use remote_client::core::Frontend;
use remote_client::list_tracker::ListView;
use remote_client::progress::TrackProgress;
use remote_client::{CallMode, RemoteError, RemoteResult, Transport};
use remote_proto::protocol::{ListPage, ListRequest, Playlist, TrackId, TrackInfo};
use serde_json::Value;

/// In-memory transport answering from a closure.  Long polls never resolve.
pub struct ScriptedTransport {
    pub calls: Mutex<Vec<String>>,
    reply: Box<dyn Fn(&str, &Value) -> RemoteResult<Value> + Send + Sync>,
}

impl ScriptedTransport {
    pub fn new(
        reply: impl Fn(&str, &Value) -> RemoteResult<Value> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, method: &str, params: Value, mode: CallMode) -> RemoteResult<Value> {
        if mode == CallMode::LongPoll {
            std::future::pending::<()>().await;
        }
        self.calls.lock().unwrap().push(method.to_string());
        (self.reply)(method, &params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Show(usize),
    Highlight(Option<usize>),
}

#[derive(Clone, Default)]
pub struct RecordingView(pub Arc<Mutex<Vec<ViewCall>>>);

impl RecordingView {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.0.lock().unwrap().clone()
    }
}

impl ListView for RecordingView {
    fn show_page(&mut self, request: &ListRequest, _page: &ListPage) {
        self.0
            .lock()
            .unwrap()
            .push(ViewCall::Show(request.window.start));
    }

    fn set_highlight(&mut self, row: Option<usize>) {
        self.0.lock().unwrap().push(ViewCall::Highlight(row));
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrontendLog {
    pub playlists: Vec<usize>,
    pub titles: Vec<Option<String>>,
    pub notices: Vec<(String, RemoteError)>,
    /// Set to have the core keep a track-info display fed.
    pub info_open: bool,
    pub infos: Vec<TrackId>,
}

#[derive(Clone, Default)]
pub struct RecordingFrontend(pub Arc<Mutex<FrontendLog>>);

impl RecordingFrontend {
    pub fn log(&self) -> FrontendLog {
        self.0.lock().unwrap().clone()
    }
}

impl Frontend for RecordingFrontend {
    fn playlists_loaded(&mut self, playlists: &[Playlist]) {
        self.0.lock().unwrap().playlists.push(playlists.len());
    }

    fn now_playing(&mut self, title: Option<&str>) {
        self.0
            .lock()
            .unwrap()
            .titles
            .push(title.map(str::to_string));
    }

    fn track_progress(&mut self, _progress: &TrackProgress) {}

    fn notify(&mut self, context: &str, error: &RemoteError) {
        self.0
            .lock()
            .unwrap()
            .notices
            .push((context.to_string(), error.clone()));
    }

    fn wants_track_info(&self) -> bool {
        self.0.lock().unwrap().info_open
    }

    fn track_info(&mut self, info: &TrackInfo) {
        self.0.lock().unwrap().infos.push(info.id);
    }
}

/// Polls `cond` until it holds or two seconds pass.
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
