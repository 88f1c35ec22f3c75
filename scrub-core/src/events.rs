//! Host lifecycle notifications and an in-process observer registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// What a finished build covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildScope {
    /// The whole workspace
    Workspace,
    /// A single project
    Project,
    /// A batch of selected projects
    Batch,
}

/// What a finished build did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildAction {
    Build,
    Rebuild,
    Clean,
    Deploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BuildFinished,
    WorkspaceClosing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BuildFinished {
        scope: BuildScope,
        action: BuildAction,
    },
    WorkspaceClosing,
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::BuildFinished { .. } => EventKind::BuildFinished,
            LifecycleEvent::WorkspaceClosing => EventKind::WorkspaceClosing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Source of host lifecycle notifications
pub trait LifecycleEvents: Send + Sync {
    fn subscribe(&self, kind: EventKind, listener: Listener) -> SubscriptionId;

    /// Returns `false` when `id` was not subscribed
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Observer registry for hosts that raise the notifications themselves.
///
/// Listeners run on the emitting thread, outside the registry lock, so a
/// listener may subscribe or unsubscribe while being dispatched.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<SubscriptionId, (EventKind, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: LifecycleEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .values()
                .filter(|(k, _)| *k == kind)
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        debug!("Dispatching {:?} to {} listener(s)", event, targets.len());
        for listener in targets {
            listener(&event);
        }
    }

    pub fn emit_build_finished(&self, scope: BuildScope, action: BuildAction) {
        self.emit(LifecycleEvent::BuildFinished { scope, action });
    }

    pub fn emit_workspace_closing(&self) {
        self.emit(LifecycleEvent::WorkspaceClosing);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl LifecycleEvents for EventBus {
    fn subscribe(&self, kind: EventKind, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (kind, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let bus = EventBus::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::BuildFinished, counting_listener(&builds));
        bus.subscribe(EventKind::WorkspaceClosing, counting_listener(&closes));

        bus.emit_build_finished(BuildScope::Workspace, BuildAction::Clean);
        bus.emit_build_finished(BuildScope::Project, BuildAction::Build);
        bus.emit_workspace_closing();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe(EventKind::WorkspaceClosing, counting_listener(&count));

        assert_eq!(bus.listener_count(EventKind::WorkspaceClosing), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.emit_workspace_closing();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(EventKind::WorkspaceClosing), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let listener: Listener = {
            let bus = Arc::clone(&bus);
            let count = Arc::clone(&count);
            let own_id = Arc::clone(&own_id);
            Arc::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.lock().unwrap().take() {
                    bus.unsubscribe(id);
                }
            })
        };
        let id = bus.subscribe(EventKind::BuildFinished, listener);
        *own_id.lock().unwrap() = Some(id);

        bus.emit_build_finished(BuildScope::Workspace, BuildAction::Clean);
        bus.emit_build_finished(BuildScope::Workspace, BuildAction::Clean);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_kind() {
        let event = LifecycleEvent::BuildFinished {
            scope: BuildScope::Batch,
            action: BuildAction::Rebuild,
        };
        assert_eq!(event.kind(), EventKind::BuildFinished);
        assert_eq!(
            LifecycleEvent::WorkspaceClosing.kind(),
            EventKind::WorkspaceClosing
        );
    }
}
