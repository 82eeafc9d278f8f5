//! # Manager pool: index-keyed reconciler over task managers.
//!
//! [`ManagerPool`] maps slot indices to [`TaskManager`]s and reconciles the
//! live set against each incoming `(config, data[])` pair: one manager per
//! index with a defined entry, created, updated, and destroyed as the data
//! vector grows and shrinks.
//!
//! ## Reconciliation
//! ```text
//! trigger(config, data)
//!   N = max(data.len(), highest live index + 1)
//!   for i in 0..N   (ascending, sequential — never concurrent)
//!     ├─► data[i] absent, manager at i → teardown + remove  (SlotRemoved)
//!     ├─► data[i] present, manager at i → manager.update(config, data[i])
//!     └─► data[i] present, no manager  → create (entry_id = i)  (SlotCreated)
//!                                        then update
//! ```
//!
//! ## Rules
//! - Slots are processed in ascending index order, one at a time; a single
//!   external event produces deterministic per-slot effects, and create/
//!   remove never race on the same index.
//! - Slot-level errors are published and logged, never propagated; the
//!   pool stays usable.
//! - Between triggers the map contains exactly the indices the most recent
//!   `data` had entries for.
//! - `teardown()` expects the root cancellation signal to have fired: it
//!   first awaits every manager's active completion, then tears each down.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::events::{Bus, Event, EventKind};
use crate::manager::TaskManager;
use crate::tasks::TaskTemplate;

/// Index-keyed reconciler keeping one [`TaskManager`] per live slot.
pub struct ManagerPool<C, D> {
    template: Arc<TaskTemplate<C, D>>,
    bus: Bus,
    managers: Mutex<BTreeMap<usize, Arc<TaskManager<C, D>>>>,
}

impl<C, D> ManagerPool<C, D>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    /// Creates an empty pool sharing the given template across all slots.
    pub fn new(template: Arc<TaskTemplate<C, D>>, bus: Bus) -> Self {
        Self {
            template,
            bus,
            managers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the sorted list of live slot indices.
    pub async fn slots(&self) -> Vec<usize> {
        self.managers.lock().await.keys().copied().collect()
    }

    /// Returns true if no slots are live.
    pub async fn is_empty(&self) -> bool {
        self.managers.lock().await.is_empty()
    }

    /// Reconciles the pool against the given data vector.
    ///
    /// Returns when every per-slot operation initiated by this call has
    /// either started or been accepted. Errors from individual slots are
    /// logged, not propagated.
    pub async fn trigger(&self, config: &C, data: &[D]) {
        let mut managers = self.managers.lock().await;
        let live_upper = managers
            .last_key_value()
            .map(|(idx, _)| idx + 1)
            .unwrap_or(0);
        let n = data.len().max(live_upper);

        for i in 0..n {
            match data.get(i) {
                None => {
                    if let Some(mgr) = managers.remove(&i) {
                        mgr.teardown().await;
                        self.bus
                            .publish(Event::now(EventKind::SlotRemoved).with_slot(i.to_string()));
                    }
                }
                Some(datum) => {
                    let mgr = match managers.get(&i) {
                        Some(existing) => Arc::clone(existing),
                        None => {
                            let created = Arc::new(TaskManager::new(
                                Arc::clone(&self.template),
                                i.to_string(),
                                self.bus.clone(),
                            ));
                            managers.insert(i, Arc::clone(&created));
                            self.bus.publish(
                                Event::now(EventKind::SlotCreated).with_slot(i.to_string()),
                            );
                            created
                        }
                    };
                    mgr.update(config.clone(), datum.clone()).await;
                }
            }
        }
    }

    /// Tears down every manager.
    ///
    /// First awaits each manager's active completion (swallowing errors),
    /// then invokes each manager's `teardown()`. Callers cancel the root
    /// signal beforehand; without it a persistent task would never drain.
    pub async fn teardown(&self) {
        let drained: Vec<(usize, Arc<TaskManager<C, D>>)> = {
            let mut managers = self.managers.lock().await;
            std::mem::take(&mut *managers).into_iter().collect()
        };

        for (_, mgr) in &drained {
            mgr.wait_idle().await;
        }
        for (i, mgr) in &drained {
            mgr.teardown().await;
            self.bus
                .publish(Event::now(EventKind::SlotRemoved).with_slot(i.to_string()));
        }
    }
}
