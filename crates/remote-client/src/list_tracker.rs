//! Tracks the open paginated playlist views and keeps the current track
//! highlighted in them.
//!
//! ```text
//!   state replaced ──► plan(state, force)
//!                        ├── Idle                 nothing to do / highlights cleared
//!                        ├── Load(PageFetch)      list not loaded; reconcile deferred
//!                        └── Locate(LocateQuery)  core asks the server where the track is
//!                                 │
//!                                 ▼
//!                      apply_location(query, location)
//!                        ├── same page      → highlight (or pending until the page draws)
//!                        ├── other page +force → move window, fetch, highlight on arrival
//!                        └── other page     → clear this list's highlight
//! ```
//!
//! The tracker does no I/O.  Every fetch it asks for carries the list's
//! generation; a result whose generation no longer matches is stale.
use std::collections::HashMap;

use remote_proto::protocol::{
    ControlPanelState, EntryLocation, ListPage, ListRequest, PageWindow, PlaylistId, TrackId,
};
use tracing::debug;

use crate::error::RemoteError;

/// A paginated list widget.
pub trait ListView: Send {
    /// Draws a fresh page.  Any previous highlight is gone after this.
    fn show_page(&mut self, request: &ListRequest, page: &ListPage);
    fn set_highlight(&mut self, row: Option<usize>);
}

/// A page load the core must perform.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFetch {
    pub playlist_id: PlaylistId,
    pub generation: u64,
    pub request: ListRequest,
}

/// A position lookup the core must perform.
#[derive(Debug, Clone, PartialEq)]
pub struct LocateQuery {
    pub playlist_id: PlaylistId,
    pub generation: u64,
    pub request: ListRequest,
    pub track_id: TrackId,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Idle,
    Load(PageFetch),
    Locate(LocateQuery),
}

/// Result of drawing a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageOutcome {
    /// Reconciliation deferred until this page arrived, with its `force` flag.
    pub deferred: Option<bool>,
    /// A pending highlight was applied.
    pub highlighted: bool,
}

struct TrackedList {
    /// Last request issued for this list.
    request: ListRequest,
    generation: u64,
    awaiting: bool,
    /// Rows of the drawn page matching `request`; `None` until it arrives.
    loaded_rows: Option<usize>,
    pending_highlight: Option<usize>,
    deferred_reconcile: Option<bool>,
    highlighted: Option<usize>,
    view: Option<Box<dyn ListView>>,
}

impl TrackedList {
    fn issue(&mut self, playlist_id: PlaylistId, issued: &mut u64) -> PageFetch {
        *issued += 1;
        self.generation = *issued;
        self.awaiting = true;
        self.loaded_rows = None;
        PageFetch {
            playlist_id,
            generation: self.generation,
            request: self.request.clone(),
        }
    }

    fn set_highlight(&mut self, row: Option<usize>) {
        if self.highlighted == row {
            return;
        }
        self.highlighted = row;
        if let Some(view) = self.view.as_mut() {
            view.set_highlight(row);
        }
    }
}

#[derive(Default)]
pub struct ListTracker {
    lists: HashMap<PlaylistId, TrackedList>,
    /// Known playlists in server order.
    order: Vec<PlaylistId>,
    /// Generation counter shared by all lists, so a reopened list never
    /// matches a fetch issued before it was closed.
    issued: u64,
}

impl ListTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the known playlists.  Open lists whose playlist disappeared
    /// are dropped; their ids are returned.
    pub fn set_playlists(&mut self, ids: Vec<PlaylistId>) -> Vec<PlaylistId> {
        let removed: Vec<PlaylistId> = self
            .lists
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in &removed {
            self.lists.remove(id);
        }
        self.order = ids;
        removed
    }

    pub fn playlists(&self) -> &[PlaylistId] {
        &self.order
    }

    /// Resolves the sentinel to the first known playlist.
    pub fn resolve(&self, playlist_id: PlaylistId) -> Option<PlaylistId> {
        if playlist_id.is_sentinel() {
            self.order.first().copied()
        } else {
            Some(playlist_id)
        }
    }

    /// Opens a list and returns its first page fetch.  The first draw runs a
    /// forced reconciliation.
    pub fn attach(
        &mut self,
        playlist_id: PlaylistId,
        view: Option<Box<dyn ListView>>,
        request: ListRequest,
    ) -> PageFetch {
        let list = self.lists.entry(playlist_id).or_insert(TrackedList {
            request: request.clone(),
            generation: 0,
            awaiting: false,
            loaded_rows: None,
            pending_highlight: None,
            deferred_reconcile: None,
            highlighted: None,
            view: None,
        });
        list.request = request;
        list.view = view;
        list.highlighted = None;
        list.pending_highlight = None;
        list.deferred_reconcile = Some(true);
        list.issue(playlist_id, &mut self.issued)
    }

    pub fn detach(&mut self, playlist_id: PlaylistId) -> bool {
        self.lists.remove(&playlist_id).is_some()
    }

    pub fn is_open(&self, playlist_id: PlaylistId) -> bool {
        self.lists.contains_key(&playlist_id)
    }

    pub fn open_lists(&self) -> Vec<PlaylistId> {
        self.lists.keys().copied().collect()
    }

    pub fn request(&self, playlist_id: PlaylistId) -> Option<&ListRequest> {
        self.lists.get(&playlist_id).map(|l| &l.request)
    }

    pub fn highlighted(&self, playlist_id: PlaylistId) -> Option<usize> {
        self.lists.get(&playlist_id).and_then(|l| l.highlighted)
    }

    /// User paging, sorting or searching.  Supersedes any fetch in flight.
    pub fn request_page(
        &mut self,
        playlist_id: PlaylistId,
        request: ListRequest,
    ) -> Option<PageFetch> {
        let list = self.lists.get_mut(&playlist_id)?;
        list.request = request;
        list.pending_highlight = None;
        Some(list.issue(playlist_id, &mut self.issued))
    }

    /// Draws a fetched page if it is still wanted.
    pub fn complete_fetch(
        &mut self,
        fetch: &PageFetch,
        page: &ListPage,
    ) -> Result<PageOutcome, RemoteError> {
        let list = match self.lists.get_mut(&fetch.playlist_id) {
            Some(list) if list.generation == fetch.generation => list,
            _ => return Err(RemoteError::StaleResult(fetch.playlist_id)),
        };
        list.awaiting = false;
        list.loaded_rows = Some(page.entries.len());
        list.highlighted = None;
        if let Some(view) = list.view.as_mut() {
            view.show_page(&list.request, page);
        }

        let mut outcome = PageOutcome {
            deferred: list.deferred_reconcile.take(),
            highlighted: false,
        };
        if let Some(row) = list.pending_highlight.take() {
            if row < page.entries.len() {
                self.highlight_exclusive(fetch.playlist_id, row);
                outcome.highlighted = true;
            }
        }
        Ok(outcome)
    }

    /// A fetch failed; the list keeps whatever it showed before.
    pub fn fail_fetch(&mut self, fetch: &PageFetch) {
        if let Some(list) = self.lists.get_mut(&fetch.playlist_id) {
            if list.generation == fetch.generation {
                list.awaiting = false;
                list.pending_highlight = None;
                list.deferred_reconcile = None;
            }
        }
    }

    /// First half of reconciliation: decides what the core has to ask for.
    pub fn plan(&mut self, state: &ControlPanelState, force: bool) -> Plan {
        if state.is_stopped() {
            self.clear_all();
            return Plan::Idle;
        }
        let Some(target) = self.resolve(state.playlist_id) else {
            self.clear_all();
            return Plan::Idle;
        };
        // Only the playing playlist may keep a highlight.
        self.clear_except(target);
        let Some(list) = self.lists.get_mut(&target) else {
            return Plan::Idle;
        };
        if list.view.is_none() {
            return Plan::Idle;
        }

        if list.loaded_rows.is_none() {
            list.deferred_reconcile = Some(force || list.deferred_reconcile.unwrap_or(false));
            if list.awaiting {
                return Plan::Idle;
            }
            return Plan::Load(list.issue(target, &mut self.issued));
        }

        Plan::Locate(LocateQuery {
            playlist_id: target,
            generation: list.generation,
            request: list.request.clone(),
            track_id: state.track_id,
            force,
        })
    }

    /// Second half of reconciliation.  Returns a page fetch when the window
    /// has to move to the track.
    pub fn apply_location(
        &mut self,
        query: &LocateQuery,
        location: Option<EntryLocation>,
    ) -> Result<Option<PageFetch>, RemoteError> {
        let list = match self.lists.get_mut(&query.playlist_id) {
            Some(list) if list.generation == query.generation => list,
            _ => return Err(RemoteError::StaleResult(query.playlist_id)),
        };

        let Some(location) = location else {
            list.set_highlight(None);
            return Ok(None);
        };

        let window = list.request.window;
        if location.page_number == window.page_number() {
            let loaded_rows = list.loaded_rows;
            match loaded_rows {
                Some(rows) if location.index_on_page < rows => {
                    self.highlight_exclusive(query.playlist_id, location.index_on_page);
                }
                Some(_) => list.set_highlight(None),
                None => list.pending_highlight = Some(location.index_on_page),
            }
            return Ok(None);
        }

        if !query.force {
            debug!(
                "tracker: playlist {} track on page {}, showing page {}",
                query.playlist_id,
                location.page_number,
                window.page_number()
            );
            list.set_highlight(None);
            return Ok(None);
        }

        list.set_highlight(None);
        list.request.window = PageWindow::page(location.page_number, window.length)?;
        list.pending_highlight = Some(location.index_on_page);
        Ok(Some(list.issue(query.playlist_id, &mut self.issued)))
    }

    pub fn clear_all(&mut self) {
        for list in self.lists.values_mut() {
            list.set_highlight(None);
        }
    }

    /// Drops the highlight of one list, e.g. when its track could not be located.
    pub fn clear(&mut self, playlist_id: PlaylistId) {
        if let Some(list) = self.lists.get_mut(&playlist_id) {
            list.set_highlight(None);
        }
    }

    fn clear_except(&mut self, playlist_id: PlaylistId) {
        for (id, list) in self.lists.iter_mut() {
            if *id != playlist_id {
                list.set_highlight(None);
            }
        }
    }

    fn highlight_exclusive(&mut self, playlist_id: PlaylistId, row: usize) {
        for (id, list) in self.lists.iter_mut() {
            if *id == playlist_id {
                list.set_highlight(Some(row));
            } else {
                list.set_highlight(None);
            }
        }
    }
}
