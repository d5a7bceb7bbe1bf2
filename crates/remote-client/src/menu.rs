//! Registry of open per-track control menus.
//!
//! A menu is keyed by `"{entry_id}_{playlist_id}"`.  Opening a menu for a key
//! that is already registered replaces the earlier registration.
use std::collections::HashMap;
use std::sync::Arc;

use remote_proto::protocol::{ControlPanelState, PlaylistId, TrackId, TrackRef};
use tracing::debug;

/// What a control menu was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMenuDescriptor {
    pub entry_id: TrackId,
    pub playlist_id: PlaylistId,
    pub play_button_id: String,
    /// Row index of the entry in its list view.
    pub row: usize,
}

impl ControlMenuDescriptor {
    pub fn new(entry_id: TrackId, playlist_id: PlaylistId, row: usize) -> Self {
        Self {
            entry_id,
            playlist_id,
            play_button_id: format!("play_entry_{}", entry_id),
            row,
        }
    }

    pub fn key(&self) -> MenuKey {
        MenuKey::new(self.entry_id, self.playlist_id)
    }

    pub fn track(&self) -> Option<TrackRef> {
        TrackRef::new(self.entry_id, self.playlist_id).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MenuKey(String);

impl MenuKey {
    pub fn new(entry_id: TrackId, playlist_id: PlaylistId) -> Self {
        Self(format!("{}_{}", entry_id, playlist_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type MenuNotifier =
    Box<dyn FnMut(&Arc<ControlMenuDescriptor>, &ControlPanelState) + Send>;

struct MenuEntry {
    descriptor: Arc<ControlMenuDescriptor>,
    notifier: MenuNotifier,
}

#[derive(Default)]
pub struct MenuRegistry {
    menus: HashMap<MenuKey, MenuEntry>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: Arc<ControlMenuDescriptor>, notifier: MenuNotifier) {
        let key = descriptor.key();
        if self.menus.contains_key(&key) {
            debug!("menu: replacing registration {}", key.as_str());
        }
        self.menus.insert(
            key,
            MenuEntry {
                descriptor,
                notifier,
            },
        );
    }

    pub fn unregister(&mut self, key: &MenuKey) -> bool {
        self.menus.remove(key).is_some()
    }

    /// Calls every notifier with the descriptor it was registered with.
    pub fn notify_all(&mut self, state: &ControlPanelState) {
        for entry in self.menus.values_mut() {
            (entry.notifier)(&entry.descriptor, state);
        }
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }
}

// ── helpers for menu widgets ──────────────────────────────────────────────────

/// The menu's track is the player's current track (playing or paused).
pub fn is_current_track_active(menu: &ControlMenuDescriptor, state: &ControlPanelState) -> bool {
    !state.is_stopped()
        && state.track_id == menu.entry_id
        && state.playlist_id == menu.playlist_id
}

pub fn is_current_track_playing(menu: &ControlMenuDescriptor, state: &ControlPanelState) -> bool {
    state.is_playing() && is_current_track_active(menu, state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Pause,
    Resume,
    PlayTrack(TrackRef),
}

/// Action bound to the menu's play button for the given state.
pub fn play_button_action(
    menu: &ControlMenuDescriptor,
    state: &ControlPanelState,
) -> Option<MenuAction> {
    if is_current_track_playing(menu, state) {
        Some(MenuAction::Pause)
    } else if is_current_track_active(menu, state) {
        Some(MenuAction::Resume)
    } else {
        menu.track().map(MenuAction::PlayTrack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_proto::protocol::PlaybackState;
    use std::sync::Mutex;

    fn state(playback_state: PlaybackState, track: i64, playlist: i64) -> ControlPanelState {
        ControlPanelState {
            playback_state,
            track_id: TrackId(track),
            playlist_id: PlaylistId(playlist),
            ..Default::default()
        }
    }

    #[test]
    fn test_notifier_receives_registered_descriptor() {
        let mut registry = MenuRegistry::new();
        let descriptor = Arc::new(ControlMenuDescriptor::new(TrackId(42), PlaylistId(7), 3));
        assert_eq!(descriptor.key().as_str(), "42_7");
        assert_eq!(descriptor.play_button_id, "play_entry_42");

        let seen: Arc<Mutex<Vec<Arc<ControlMenuDescriptor>>>> = Arc::default();
        let sink = seen.clone();
        registry.register(
            descriptor.clone(),
            Box::new(move |menu, _| sink.lock().unwrap().push(Arc::clone(menu))),
        );

        registry.notify_all(&state(PlaybackState::Playing, 42, 7));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(Arc::ptr_eq(&seen[0], &descriptor));
    }

    #[test]
    fn test_register_same_key_overwrites() {
        let mut registry = MenuRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let sink = calls.clone();
            registry.register(
                Arc::new(ControlMenuDescriptor::new(TrackId(1), PlaylistId(2), 0)),
                Box::new(move |_, _| sink.lock().unwrap().push(tag)),
            );
        }
        assert_eq!(registry.len(), 1);

        registry.notify_all(&ControlPanelState::default());
        assert_eq!(*calls.lock().unwrap(), vec!["second"]);

        assert!(registry.unregister(&MenuKey::new(TrackId(1), PlaylistId(2))));
        assert!(registry.is_empty());
        assert!(!registry.unregister(&MenuKey::new(TrackId(1), PlaylistId(2))));
    }

    #[test]
    fn test_play_button_action() {
        let menu = ControlMenuDescriptor::new(TrackId(42), PlaylistId(7), 0);
        assert_eq!(
            play_button_action(&menu, &state(PlaybackState::Playing, 42, 7)),
            Some(MenuAction::Pause)
        );
        assert_eq!(
            play_button_action(&menu, &state(PlaybackState::Paused, 42, 7)),
            Some(MenuAction::Resume)
        );
        let track = TrackRef::new(TrackId(42), PlaylistId(7)).unwrap();
        assert_eq!(
            play_button_action(&menu, &state(PlaybackState::Playing, 41, 7)),
            Some(MenuAction::PlayTrack(track))
        );
        assert_eq!(
            play_button_action(&menu, &state(PlaybackState::Stopped, 42, 7)),
            Some(MenuAction::PlayTrack(track))
        );
    }
}
