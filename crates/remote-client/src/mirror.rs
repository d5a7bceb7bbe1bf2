use std::sync::Arc;

use remote_proto::protocol::ControlPanelState;

/// Display widget bound to the mirrored state.
pub trait StateObserver: Send {
    fn state_replaced(&mut self, state: &Arc<ControlPanelState>);
}

/// Holds the last known control-panel snapshot.  Owned by the core task;
/// replaced wholesale on every push, never patched field by field.
pub struct StateMirror {
    current: Arc<ControlPanelState>,
    observers: Vec<Box<dyn StateObserver>>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ControlPanelState::default()),
            observers: Vec::new(),
        }
    }

    pub fn current(&self) -> Arc<ControlPanelState> {
        Arc::clone(&self.current)
    }

    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    /// Swaps in `state` and notifies every observer before returning.
    pub fn replace(&mut self, state: ControlPanelState) -> Arc<ControlPanelState> {
        self.current = Arc::new(state);
        for observer in &mut self.observers {
            observer.state_replaced(&self.current);
        }
        Arc::clone(&self.current)
    }
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}
