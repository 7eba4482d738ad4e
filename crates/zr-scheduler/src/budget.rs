//! Advisory admission control for a Task Node's declared `max_cpu`/
//! `max_memory`, per spec.md §4.6: these are aggregate caps the scheduler
//! uses to decide whether a Ready node may be admitted, never OS-enforced
//! limits (no cgroups or rlimits are involved).

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    cpu_in_use: u32,
    memory_in_use: u64,
}

#[derive(Debug)]
struct Inner {
    cpu_total: Option<u32>,
    memory_total: Option<u64>,
    state: Mutex<State>,
    notify: Notify,
}

/// Cheaply-cloneable handle to the aggregate cpu/memory budget for one
/// [`crate::Scheduler::execute`] run.
#[derive(Debug, Clone)]
pub struct ResourceBudget(Arc<Inner>);

impl ResourceBudget {
    pub fn new(cpu_total: Option<u32>, memory_total: Option<u64>) -> Self {
        Self(Arc::new(Inner {
            cpu_total,
            memory_total,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }))
    }

    /// Waits until `cpu`/`memory` (if declared) fit within the remaining
    /// budget, then reserves it. A task that declares neither never waits.
    pub async fn acquire(&self, cpu: Option<u32>, memory: Option<u64>) -> BudgetGuard {
        loop {
            let notified = self.0.notify.notified();
            if self.try_reserve(cpu, memory) {
                return BudgetGuard {
                    inner: Arc::clone(&self.0),
                    cpu,
                    memory,
                };
            }
            notified.await;
        }
    }

    fn try_reserve(&self, cpu: Option<u32>, memory: Option<u64>) -> bool {
        let mut state = self.0.state.lock().expect("resource budget mutex poisoned");
        let cpu_ok = match (cpu, self.0.cpu_total) {
            (Some(c), Some(total)) => state.cpu_in_use + c <= total,
            _ => true,
        };
        let mem_ok = match (memory, self.0.memory_total) {
            (Some(m), Some(total)) => state.memory_in_use + m <= total,
            _ => true,
        };
        if cpu_ok && mem_ok {
            if let Some(c) = cpu {
                state.cpu_in_use += c;
            }
            if let Some(m) = memory {
                state.memory_in_use += m;
            }
            true
        } else {
            false
        }
    }
}

/// Releases its reservation on drop and wakes any task waiting for budget.
pub struct BudgetGuard {
    inner: Arc<Inner>,
    cpu: Option<u32>,
    memory: Option<u64>,
}

impl Drop for BudgetGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().expect("resource budget mutex poisoned");
            if let Some(c) = self.cpu {
                state.cpu_in_use = state.cpu_in_use.saturating_sub(c);
            }
            if let Some(m) = self.memory {
                state.memory_in_use = state.memory_in_use.saturating_sub(m);
            }
        }
        self.inner.notify.notify_waiters();
    }
}
