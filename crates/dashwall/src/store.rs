//! Dashboard persistence interface and two implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::widget::{Dashboard, DashboardId, Widget, WidgetId};

pub type StoreFuture<T> = BoxFuture<'static, Result<T, StoreError>>;

pub trait DashboardStore: Send + Sync {
    fn dashboards(&self) -> StoreFuture<Vec<Dashboard>>;

    fn dashboard(&self, id: &DashboardId) -> StoreFuture<Dashboard>;

    /// Widgets of a dashboard in layout order.
    fn widgets(&self, id: &DashboardId) -> StoreFuture<Vec<Widget>>;

    fn update_widget_state(&self, id: &WidgetId, state: Value) -> StoreFuture<()>;
}

/// On-disk and in-memory document shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl StoreData {
    fn dashboard(&self, id: &DashboardId) -> Result<Dashboard, StoreError> {
        self.dashboards
            .iter()
            .find(|dashboard| &dashboard.id == id)
            .cloned()
            .ok_or_else(|| StoreError::DashboardNotFound(id.clone()))
    }

    fn widgets(&self, id: &DashboardId) -> Result<Vec<Widget>, StoreError> {
        self.dashboard(id)?;
        let mut widgets: Vec<Widget> = self
            .widgets
            .iter()
            .filter(|widget| &widget.dashboard_id == id)
            .cloned()
            .collect();
        widgets.sort_by_key(|widget| (widget.layout.row_index, widget.layout.column_index));
        Ok(widgets)
    }

    fn set_state(&mut self, id: &WidgetId, state: Value) -> Result<(), StoreError> {
        let widget = self
            .widgets
            .iter_mut()
            .find(|widget| &widget.id == id)
            .ok_or_else(|| StoreError::WidgetNotFound(id.clone()))?;
        widget.state = Some(state);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<StoreData>>,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }
}

impl DashboardStore for MemoryStore {
    fn dashboards(&self) -> StoreFuture<Vec<Dashboard>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.read().await.dashboards.clone()) })
    }

    fn dashboard(&self, id: &DashboardId) -> StoreFuture<Dashboard> {
        let (data, id) = (self.data.clone(), id.clone());
        Box::pin(async move { data.read().await.dashboard(&id) })
    }

    fn widgets(&self, id: &DashboardId) -> StoreFuture<Vec<Widget>> {
        let (data, id) = (self.data.clone(), id.clone());
        Box::pin(async move { data.read().await.widgets(&id) })
    }

    fn update_widget_state(&self, id: &WidgetId, state: Value) -> StoreFuture<()> {
        let (data, id) = (self.data.clone(), id.clone());
        Box::pin(async move { data.write().await.set_state(&id, state) })
    }
}

/// JSON document `{"dashboards": [...], "widgets": [...]}` kept in memory
/// and rewritten in full after every state update.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Arc<RwLock<StoreData>>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let text = tokio::fs::read_to_string(&path).await?;
        let data: StoreData = serde_json::from_str(&text)?;
        tracing::info!(
            path = %path.display(),
            dashboards = data.dashboards.len(),
            widgets = data.widgets.len(),
            "dashboard store loaded"
        );
        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn write_atomically(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

impl DashboardStore for JsonFileStore {
    fn dashboards(&self) -> StoreFuture<Vec<Dashboard>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.read().await.dashboards.clone()) })
    }

    fn dashboard(&self, id: &DashboardId) -> StoreFuture<Dashboard> {
        let (data, id) = (self.data.clone(), id.clone());
        Box::pin(async move { data.read().await.dashboard(&id) })
    }

    fn widgets(&self, id: &DashboardId) -> StoreFuture<Vec<Widget>> {
        let (data, id) = (self.data.clone(), id.clone());
        Box::pin(async move { data.read().await.widgets(&id) })
    }

    fn update_widget_state(&self, id: &WidgetId, state: Value) -> StoreFuture<()> {
        let (data, id, path) = (self.data.clone(), id.clone(), self.path.clone());
        Box::pin(async move {
            // Held across the write so concurrent updates land in order.
            let mut guard = data.write().await;
            guard.set_state(&id, state)?;
            write_atomically(&path, &guard).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> StoreData {
        let mut second = Widget::new("w2", "habits", "d1", json!({}));
        second.layout.row_index = 1;
        let first = Widget::new("w1", "clock", "d1", json!({}));
        StoreData {
            dashboards: vec![Dashboard {
                id: DashboardId::new("d1"),
                name: "Kitchen".to_string(),
                is_black_theme: false,
                device_id: None,
            }],
            widgets: vec![second, first, Widget::new("w3", "clock", "d2", json!({}))],
        }
    }

    #[tokio::test]
    async fn memory_store_orders_widgets_by_layout() {
        let store = MemoryStore::new(sample());
        let ids: Vec<String> = store
            .widgets(&DashboardId::new("d1"))
            .await
            .expect("widgets")
            .into_iter()
            .map(|widget| widget.id.0)
            .collect();
        assert_eq!(ids, vec!["w1", "w2"]);
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let store = MemoryStore::new(sample());
        assert!(matches!(
            store.dashboard(&DashboardId::new("nope")).await,
            Err(StoreError::DashboardNotFound(_))
        ));
        assert!(matches!(
            store.widgets(&DashboardId::new("d2")).await,
            Err(StoreError::DashboardNotFound(_))
        ));
        assert!(matches!(
            store.update_widget_state(&WidgetId::new("ghost"), json!({})).await,
            Err(StoreError::WidgetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn json_file_store_persists_state_updates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dashboards.json");
        std::fs::write(&path, serde_json::to_string(&sample()).expect("json")).expect("write");

        let store = JsonFileStore::open(&path).await.expect("open");
        store
            .update_widget_state(&WidgetId::new("w2"), json!({"items": {"water": {"currentValue": 3}}}))
            .await
            .expect("update");

        let reopened = JsonFileStore::open(&path).await.expect("reopen");
        let widgets = reopened.widgets(&DashboardId::new("d1")).await.expect("widgets");
        assert_eq!(
            widgets[1].state,
            Some(json!({"items": {"water": {"currentValue": 3}}}))
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn json_file_store_rejects_malformed_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(JsonFileStore::open(&path).await, Err(StoreError::Malformed(_))));
        assert!(matches!(
            JsonFileStore::open(dir.path().join("missing.json")).await,
            Err(StoreError::Io(_))
        ));
    }
}
