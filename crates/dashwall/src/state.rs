//! Fire-and-forget persistence of widget state.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::render::SaveStateFn;
use crate::store::DashboardStore;
use crate::widget::WidgetId;

#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub widget_id: WidgetId,
    pub state: Value,
}

/// Sending half handed to renderers. `save` never blocks and never fails
/// from the caller's point of view.
#[derive(Clone)]
pub struct StateBridge {
    tx: mpsc::UnboundedSender<StateUpdate>,
}

/// Draining half that talks to the store.
pub struct StateWriter {
    rx: mpsc::UnboundedReceiver<StateUpdate>,
    store: Arc<dyn DashboardStore>,
}

pub fn channel(store: Arc<dyn DashboardStore>) -> (StateBridge, StateWriter) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StateBridge { tx }, StateWriter { rx, store })
}

impl StateBridge {
    pub fn save(&self, widget_id: &WidgetId, state: Value) {
        let update = StateUpdate {
            widget_id: widget_id.clone(),
            state,
        };
        if self.tx.send(update).is_err() {
            tracing::warn!(widget = %widget_id, "state writer stopped, update discarded");
        }
    }

    pub fn as_save_fn(&self) -> SaveStateFn {
        let bridge = self.clone();
        Arc::new(move |widget_id: &WidgetId, state: Value| bridge.save(widget_id, state))
    }
}

impl StateWriter {
    /// Persists updates until every bridge is dropped.
    pub async fn run(mut self) {
        while let Some(update) = self.rx.recv().await {
            self.persist(update).await;
        }
        tracing::debug!("state writer finished");
    }

    /// Persists whatever is queued right now and returns how many updates
    /// were attempted.
    pub async fn flush(&mut self) -> usize {
        let mut attempted = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.persist(update).await;
            attempted += 1;
        }
        attempted
    }

    async fn persist(&self, update: StateUpdate) {
        let StateUpdate { widget_id, state } = update;
        match self.store.update_widget_state(&widget_id, state).await {
            Ok(()) => tracing::trace!(widget = %widget_id, "widget state saved"),
            Err(err) => tracing::warn!(widget = %widget_id, error = %err, "failed to save widget state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoreData, StoreFuture};
    use crate::widget::{Dashboard, DashboardId, Widget};
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(StoreData {
            dashboards: vec![Dashboard {
                id: DashboardId::new("d1"),
                name: "Hall".to_string(),
                is_black_theme: true,
                device_id: None,
            }],
            widgets: vec![Widget::new("w1", "habits", "d1", json!({}))],
        })
    }

    struct Unreachable;

    impl DashboardStore for Unreachable {
        fn dashboards(&self) -> StoreFuture<Vec<Dashboard>> {
            Box::pin(async { Err(StoreError::Unavailable("offline".to_string())) })
        }

        fn dashboard(&self, _id: &DashboardId) -> StoreFuture<Dashboard> {
            Box::pin(async { Err(StoreError::Unavailable("offline".to_string())) })
        }

        fn widgets(&self, _id: &DashboardId) -> StoreFuture<Vec<Widget>> {
            Box::pin(async { Err(StoreError::Unavailable("offline".to_string())) })
        }

        fn update_widget_state(&self, _id: &WidgetId, _state: Value) -> StoreFuture<()> {
            Box::pin(async { Err(StoreError::Unavailable("offline".to_string())) })
        }
    }

    #[tokio::test]
    async fn saved_state_reaches_the_store() {
        let store = store();
        let (bridge, mut writer) = channel(Arc::new(store.clone()));
        let save = bridge.as_save_fn();
        save(&WidgetId::new("w1"), json!({"items": {}}));
        bridge.save(&WidgetId::new("w1"), json!({"items": {"water": {"currentValue": 1}}}));

        assert_eq!(writer.flush().await, 2);
        assert_eq!(
            store.snapshot().await.widgets[0].state,
            Some(json!({"items": {"water": {"currentValue": 1}}}))
        );
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let (bridge, mut writer) = channel(Arc::new(Unreachable));
        bridge.save(&WidgetId::new("w1"), json!({}));
        bridge.save(&WidgetId::new("w2"), json!({}));
        assert_eq!(writer.flush().await, 2);
        assert_eq!(writer.flush().await, 0);
    }

    #[tokio::test]
    async fn run_exits_when_bridges_are_dropped() {
        let store = store();
        let (bridge, writer) = channel(Arc::new(store.clone()));
        bridge.save(&WidgetId::new("ghost"), json!({}));
        bridge.save(&WidgetId::new("w1"), json!({"ok": true}));
        drop(bridge);
        writer.run().await;
        assert_eq!(store.snapshot().await.widgets[0].state, Some(json!({"ok": true})));
    }
}
