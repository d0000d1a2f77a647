use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::compose::Composer;
use crate::widget::DashboardId;

struct ParkedView {
    dashboard_id: DashboardId,
    composer: Composer,
    parked_at: Instant,
}

/// Live compositions waiting for their device to open the socket.
///
/// A page load parks its composer under a fresh view id; the socket session
/// claims it with `hello`. Views nobody claims within the TTL are dropped,
/// which tears their widgets down.
#[derive(Clone)]
pub struct ViewRegistry {
    parked: Arc<Mutex<HashMap<String, ParkedView>>>,
    ttl: Duration,
}

impl ViewRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            parked: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ParkedView>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn park(&self, dashboard_id: DashboardId, composer: Composer) -> String {
        let view_id = uuid::Uuid::new_v4().to_string();
        self.lock().insert(
            view_id.clone(),
            ParkedView {
                dashboard_id,
                composer,
                parked_at: Instant::now(),
            },
        );
        view_id
    }

    /// Hands the composer over to a session. A view parked for another
    /// dashboard stays parked.
    pub fn claim(&self, view_id: &str, dashboard_id: &DashboardId) -> Option<Composer> {
        let mut parked = self.lock();
        match parked.get(view_id) {
            Some(view) if &view.dashboard_id == dashboard_id => {}
            _ => return None,
        }
        parked.remove(view_id).map(|view| view.composer)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops views parked longer than the TTL and returns how many.
    pub fn sweep(&self) -> usize {
        let expired: Vec<ParkedView> = {
            let mut parked = self.lock();
            let stale: Vec<String> = parked
                .iter()
                .filter(|(_, view)| view.parked_at.elapsed() >= self.ttl)
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| parked.remove(id)).collect()
        };
        let count = expired.len();
        // Composers tear down on drop, outside the lock.
        drop(expired);
        if count > 0 {
            tracing::debug!(views = count, "expired unclaimed views");
        }
        count
    }

    /// Sweeps every half TTL until the registry's last clone is gone.
    pub async fn run_sweeper(self) {
        let period = (self.ttl / 2).max(Duration::from_secs(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if Arc::strong_count(&self.parked) == 1 {
                break;
            }
            self.sweep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Services;
    use crate::quotes::StaticQuotes;
    use crate::render::{RenderRegistry, RenderSettings};
    use crate::state;
    use crate::store::MemoryStore;
    use tokio::runtime::Handle;

    fn composer() -> Composer {
        let store = Arc::new(MemoryStore::default());
        let (bridge, _writer) = state::channel(store.clone());
        let services = Services::system(Handle::current(), Arc::new(StaticQuotes::new()), RenderSettings::default());
        Composer::new(RenderRegistry::builtin(), store, bridge, services)
    }

    #[tokio::test]
    async fn claim_checks_dashboard_and_is_single_use() {
        let views = ViewRegistry::new(Duration::from_secs(60));
        let id = views.park(DashboardId::new("d1"), composer());
        assert!(views.claim(&id, &DashboardId::new("d2")).is_none());
        assert!(views.claim(&id, &DashboardId::new("d1")).is_some());
        assert!(views.claim(&id, &DashboardId::new("d1")).is_none());
        assert!(views.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired_views() {
        let views = ViewRegistry::new(Duration::from_secs(60));
        views.park(DashboardId::new("d1"), composer());
        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = views.park(DashboardId::new("d1"), composer());
        assert_eq!(views.sweep(), 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(views.sweep(), 1);
        assert!(views.claim(&fresh, &DashboardId::new("d1")).is_some());
    }
}
