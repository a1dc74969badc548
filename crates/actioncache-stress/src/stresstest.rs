use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use actioncache::config::Config;
use actioncache::{ActionCache, ActionRegistry};
use anyhow::{Context, Result};
use tokio::sync::Semaphore;

use crate::workloads::{Workload, WorkloadsConfig, prepare_registry};

type Cache = ActionCache<ActionRegistry<u64, String>>;

#[derive(Debug, Default)]
struct Stats {
    dispatches: AtomicUsize,
    failures: AtomicUsize,
}

pub async fn perform_stresstest(
    config: Config,
    workloads: WorkloadsConfig,
    duration: Duration,
) -> Result<()> {
    let (registry, executions) = prepare_registry(&workloads.workloads);
    let cache = ActionCache::new(registry, config.cache);
    let workloads: Vec<_> = workloads.workloads.into_iter().map(Arc::new).collect();

    // warmup: run each workload once to make sure caches are warm
    {
        let start = Instant::now();

        let futures = workloads.iter().map(|workload| {
            let cache = cache.clone();
            let workload = Arc::clone(workload);
            tokio::spawn(async move {
                process_dispatch(&cache, &workload, 0).await;
            })
        });

        let _results = futures::future::join_all(futures).await;

        println!("Warmup: {:?}", start.elapsed());
    };
    println!();

    let warmup_executions: Vec<_> = executions
        .iter()
        .map(|counter| counter.load(Ordering::Relaxed))
        .collect();

    // run the workloads concurrently
    let mut tasks = Vec::with_capacity(workloads.len());
    for workload in workloads.iter() {
        let start = Instant::now();
        let deadline = tokio::time::Instant::from_std(start + duration);
        let cache = cache.clone();
        let workload = Arc::clone(workload);

        let task = tokio::spawn(async move {
            let concurrency = workload.concurrency.max(1);
            let stats = Arc::new(Stats::default());
            let semaphore = Arc::new(Semaphore::new(concurrency));
            let mut seq = 0;

            // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
            let sleep = tokio::time::sleep_until(deadline);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    permit = semaphore.clone().acquire_owned() => {
                        let cache = cache.clone();
                        let workload = Arc::clone(&workload);
                        let stats = Arc::clone(&stats);
                        seq += 1;
                        let current = seq;

                        tokio::spawn(async move {
                            let ok = process_dispatch(&cache, &workload, current).await;

                            stats.dispatches.fetch_add(1, Ordering::Relaxed);
                            if !ok {
                                stats.failures.fetch_add(1, Ordering::Relaxed);
                            }

                            drop(permit);
                        });
                    }
                    _ = &mut sleep => {
                        break;
                    }
                }
            }

            // by acquiring *all* the semaphores, we essentially wait for all outstanding tasks to finish
            let _permits = semaphore.acquire_many(concurrency as u32).await;

            (concurrency, stats)
        });
        tasks.push(task);
    }

    let finished_tasks = futures::future::join_all(tasks).await;

    for (i, task) in finished_tasks.into_iter().enumerate() {
        let (concurrency, stats) = task.context("workload task panicked")?;
        let workload = &workloads[i];

        let ops = stats.dispatches.load(Ordering::Relaxed);
        let failures = stats.failures.load(Ordering::Relaxed);
        let ops_ps = ops as f32 / duration.as_secs_f32();
        println!(
            "Workload {i} ({}, concurrency: {concurrency}): {ops} operations, {ops_ps:.2} ops/s",
            workload.action
        );
        println!("  failures: {failures}");
    }

    println!();
    for (i, workload) in workloads.iter().enumerate() {
        let total = executions[i].load(Ordering::Relaxed) - warmup_executions[i];
        println!("Action {}: {total} executions", workload.action);
    }
    println!("Cache entries: {}", cache.state().len());

    Ok(())
}

/// Dispatches the `seq`-th payload of `workload`, and returns whether it succeeded.
async fn process_dispatch(cache: &Cache, workload: &Workload, seq: usize) -> bool {
    match cache.dispatch(&workload.action, workload.payload(seq)) {
        Ok(dispatch) => dispatch.await.is_ok(),
        Err(error) => {
            tracing::error!(%error, "Dispatch failed");
            false
        }
    }
}
