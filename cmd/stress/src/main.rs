//! Stress test - many submitters, few workers
//!
//! Usage: stress [tasks] [workers] [submitters]
//!
//! Submitters outnumber workers so most submits park in the slot waiter.
//! At the end the available count must be back to the worker count.

use bytes::Bytes;
use slotpool::{PoolConfig, PoolError, PoolRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn arg(n: usize, default: u64) -> u64 {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    slotpool::init_logging();
    println!("=== slotpool Stress Test ===\n");

    let num_tasks = arg(1, 20_000);
    let num_workers = arg(2, 8).min(16) as u32;
    let num_submitters = arg(3, 32).max(1);

    println!(
        "{} tasks, {} workers, {} submitter threads",
        num_tasks, num_workers, num_submitters
    );

    let registry = Arc::new(PoolRegistry::with_config(PoolConfig::from_env()));
    let pool = match registry.create_pool(num_workers, 10_000) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("create_pool failed: {}", e);
            std::process::exit(1);
        }
    };

    let submitted = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let timeouts = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..num_submitters)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let submitted = Arc::clone(&submitted);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);
            let timeouts = Arc::clone(&timeouts);
            thread::Builder::new()
                .name(format!("submitter-{}", t))
                .spawn(move || loop {
                    let i = submitted.fetch_add(1, Ordering::Relaxed);
                    if i >= num_tasks {
                        break;
                    }
                    let outcome = registry.submit_fn(
                        pool,
                        "spin",
                        move || {
                            // A little CPU work; every 97th task fails
                            let mut x = i;
                            for _ in 0..1_000 {
                                x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
                            }
                            if i % 97 == 0 {
                                Err(format!("task {} rejected", i))
                            } else {
                                Ok(Bytes::from(x.to_le_bytes().to_vec()))
                            }
                        },
                        2_000,
                    );
                    match outcome {
                        Ok(_) => completed.fetch_add(1, Ordering::Relaxed),
                        Err(PoolError::TaskExecution { .. }) => failed.fetch_add(1, Ordering::Relaxed),
                        Err(e) if e.is_retryable() => timeouts.fetch_add(1, Ordering::Relaxed),
                        Err(e) => {
                            tracing::error!(error = %e, "submit failed");
                            break;
                        }
                    };
                })
                .unwrap_or_else(|e| {
                    eprintln!("failed to spawn submitter: {}", e);
                    std::process::exit(1);
                })
        })
        .collect();

    while handles.iter().any(|h| !h.is_finished()) {
        let done = completed.load(Ordering::Relaxed) + failed.load(Ordering::Relaxed);
        print!("\rFinished: {}/{}", done, num_tasks);
        thread::sleep(Duration::from_millis(100));
    }
    for h in handles {
        let _ = h.join();
    }
    let total_time = start.elapsed();

    let stats = registry.stats(pool);
    registry.destroy_pool(pool);

    let done = completed.load(Ordering::Relaxed);
    println!("\n\n=== Results ===");
    println!("Completed:       {}", done);
    println!("Task errors:     {}", failed.load(Ordering::Relaxed));
    println!("Wait timeouts:   {}", timeouts.load(Ordering::Relaxed));
    println!("Total time:      {:?}", total_time);
    println!(
        "Throughput:      {:.0} tasks/sec",
        (done + failed.load(Ordering::Relaxed)) as f64 / total_time.as_secs_f64()
    );

    match stats {
        Ok(stats) => {
            println!("Available after: {}/{}", stats.available_workers, num_workers);
            for w in &stats.workers {
                println!("  slot {:>2}: tasks={:<6} avg={}ms", w.slot, w.tasks_completed, w.avg_duration_ms);
            }
            if stats.available_workers != num_workers {
                eprintln!("available count did not return to {}", num_workers);
                std::process::exit(2);
            }
        }
        Err(e) => eprintln!("stats failed: {}", e),
    }

    println!("\n=== Stress Test Complete ===");
}
