//! Basic example - one pool, a few task types
//!
//! Registers handlers, submits tasks, prints stats, destroys the pool.
//! Set `SLOTPOOL_LOG=debug` to see coordinator events.

use bytes::Bytes;
use slotpool::{PoolError, PoolRegistry};
use std::time::Duration;

fn main() {
    slotpool::init_logging();
    println!("=== slotpool Basic Example ===\n");

    let registry = PoolRegistry::new();

    registry.register_handler("reverse", |p: Bytes| -> Result<Bytes, String> {
        Ok(p.iter().rev().copied().collect::<Vec<u8>>().into())
    });
    registry.register_handler("checksum", |p: Bytes| -> Result<Bytes, String> {
        let sum = p.iter().fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(b as u32));
        Ok(Bytes::from(sum.to_string()))
    });
    registry.register_handler("parse_int", |p: Bytes| -> Result<Bytes, String> {
        let text = std::str::from_utf8(&p).map_err(|e| e.to_string())?;
        let n: i64 = text.trim().parse().map_err(|e| format!("{}: {:?}", e, text))?;
        Ok(Bytes::from((n * 2).to_string()))
    });

    let pool = match registry.create_pool(4, 5_000) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("create_pool failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Created {}", pool);

    let jobs: [(&str, &[u8]); 4] = [
        ("reverse", b"hello slotpool"),
        ("checksum", b"the quick brown fox"),
        ("parse_int", b"21"),
        ("parse_int", b"not a number"),
    ];

    for (task_type, payload) in jobs {
        match registry.submit(pool, task_type, Bytes::copy_from_slice(payload), 1_000) {
            Ok(result) => println!(
                "{:<10} slot {} in {:?}: {}",
                task_type,
                result.slot,
                result.duration,
                String::from_utf8_lossy(&result.output)
            ),
            Err(PoolError::TaskExecution { message, .. }) => {
                println!("{:<10} failed: {}", task_type, message)
            }
            Err(e) => println!("{:<10} error: {}", task_type, e),
        }
    }

    // A task that takes a measurable amount of time
    let slow = registry.submit_fn(
        pool,
        "sleep",
        || {
            std::thread::sleep(Duration::from_millis(25));
            Ok(Bytes::from_static(b"slept"))
        },
        1_000,
    );
    println!("sleep      {:?}", slow.map(|r| r.duration));

    if let Ok(stats) = registry.stats(pool) {
        println!("\n=== Stats ===");
        println!("State:     {}", stats.state);
        println!("Available: {}/{}", stats.available_workers, stats.workers.len());
        println!("Completed: {}", stats.total_tasks_completed);
        for w in &stats.workers {
            println!(
                "  slot {:>2}: {:<8} tasks={:<3} avg={}ms",
                w.slot, w.status.to_string(), w.tasks_completed, w.avg_duration_ms
            );
        }
    }

    registry.destroy_pool(pool);
    match registry.stats(pool) {
        Err(PoolError::PoolNotFound(id)) => println!("\n{} destroyed", id),
        other => println!("\nunexpected after destroy: {:?}", other),
    }

    println!("\n=== Basic Example Complete ===");
}
