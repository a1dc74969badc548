use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actioncache::{ActionRegistry, Payload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct WorkloadsConfig {
    pub workloads: Vec<Workload>,
}

/// A stream of dispatches of one simulated action.
#[derive(Debug, Deserialize, Serialize)]
pub struct Workload {
    pub concurrency: usize,
    /// The name the simulated action is registered as.
    pub action: String,
    /// The number of distinct payloads dispatches cycle through.
    #[serde(default = "default_keys")]
    pub keys: usize,
    /// How long every execution of the action takes.
    #[serde(default, with = "humantime_serde")]
    pub latency: Duration,
    /// Fail every n-th execution of the action.
    #[serde(default)]
    pub fail_every: Option<usize>,
}

fn default_keys() -> usize {
    1
}

impl Workload {
    /// The payload of the `seq`-th dispatch of this workload.
    pub fn payload(&self, seq: usize) -> Option<Payload> {
        let key = seq % self.keys.max(1);
        Some(Payload::object().with("key", key as u64))
    }
}

/// Counts the actual executions of one simulated action.
pub type Executions = Arc<AtomicUsize>;

/// Registers a simulated action for every workload.
///
/// Workloads sharing an action name share the action and its [`Executions`].
pub fn prepare_registry(workloads: &[Workload]) -> (ActionRegistry<u64, String>, Vec<Executions>) {
    let mut registry = ActionRegistry::new();
    let mut by_action: BTreeMap<&str, Executions> = BTreeMap::new();
    let mut executions = Vec::with_capacity(workloads.len());

    for workload in workloads {
        if let Some(counter) = by_action.get(workload.action.as_str()) {
            executions.push(Arc::clone(counter));
            continue;
        }

        let counter = Executions::default();
        let latency = workload.latency;
        let fail_every = workload.fail_every.filter(|&every| every > 0);

        registry = registry.register(workload.action.clone(), {
            let counter = Arc::clone(&counter);
            move |_payload| {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                async move {
                    tokio::time::sleep(latency).await;
                    match fail_every {
                        Some(every) if n % every == 0 => Err(format!("execution {n} failed")),
                        _ => Ok(n as u64),
                    }
                }
            }
        });
        by_action.insert(workload.action.as_str(), Arc::clone(&counter));
        executions.push(counter);
    }

    (registry, executions)
}
