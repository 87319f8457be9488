//! shardcache soak driver
//!
//! Runs a mixed read/write/remove workload against a cache for a fixed time
//! and reports hit rate, size and evictions. Useful for eyeballing lock
//! contention and expiry behaviour under load.

use bytes::Bytes;
use shardcache::{Cache, CacheConfig, NotifyConfig, OverflowPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Driver configuration
struct Config {
    /// Total cache capacity
    capacity: usize,
    /// Number of shards
    shards: usize,
    /// Concurrent workload tasks
    tasks: usize,
    /// Distinct keys the workload draws from
    keys: u64,
    /// TTL of every write, in milliseconds (0 = never expires)
    ttl_ms: u64,
    /// How long to run
    duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            shards: 64,
            tasks: 8,
            keys: 200_000,
            ttl_ms: 500,
            duration: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow::anyhow!("{} requires a value", arg))
            };
            match arg.as_str() {
                "--capacity" | "-c" => config.capacity = value()?.parse()?,
                "--shards" | "-s" => config.shards = value()?.parse()?,
                "--tasks" | "-t" => config.tasks = value()?.parse()?,
                "--keys" | "-k" => config.keys = value()?.parse()?,
                "--ttl-ms" => config.ttl_ms = value()?.parse()?,
                "--seconds" => config.duration = Duration::from_secs(value()?.parse()?),
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("shardcache version {}", shardcache::VERSION);
                    std::process::exit(0);
                }
                other => anyhow::bail!("unknown argument: {}", other),
            }
        }

        Ok(config)
    }
}

fn print_help() {
    println!(
        r#"
shardcache soak driver

USAGE:
    shardcache [OPTIONS]

OPTIONS:
    -c, --capacity <N>    Total cache capacity (default: 100000)
    -s, --shards <N>      Number of shards (default: 64)
    -t, --tasks <N>       Concurrent workload tasks (default: 8)
    -k, --keys <N>        Distinct keys to draw from (default: 200000)
        --ttl-ms <MS>     TTL of each write, 0 = never (default: 500)
        --seconds <S>     Run time in seconds (default: 10)
    -v, --version         Print version information
        --help            Print this help message
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args()?;

    // Set up logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let evictions = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&evictions);

    let cache_config = CacheConfig::default()
        .with_name("soak")
        .with_capacity(config.capacity)
        .with_shards(config.shards)
        .with_notify(NotifyConfig {
            workers: 2,
            queue_capacity: 4096,
            overflow: OverflowPolicy::DropOldest,
        })
        .with_eviction_callback(move |_key: Bytes, _value: Bytes| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    let cache = Arc::new(Cache::new(cache_config)?);

    info!(
        capacity = config.capacity,
        shards = config.shards,
        tasks = config.tasks,
        "Starting workload"
    );

    let ttl = Duration::from_millis(config.ttl_ms);
    let deadline = Instant::now() + config.duration;
    let workers: Vec<_> = (0..config.tasks as u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let keys = config.keys.max(1);
            tokio::spawn(async move {
                let mut i = t;
                while Instant::now() < deadline {
                    let key = Bytes::from(format!("key:{}", (i * 7919) % keys));
                    match i % 10 {
                        0..=2 => cache.set(key, Bytes::from_static(b"value"), ttl),
                        3 => {
                            cache.remove(&key);
                        }
                        _ => {
                            cache.get(&key);
                        }
                    }
                    i += 1;
                    if i % 1024 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();

    tokio::select! {
        failed = join_workers(workers) => {
            if failed > 0 {
                warn!(failed, "Some workload tasks did not finish cleanly");
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping workload...");
        }
    }

    let stats = cache.stats();
    info!(
        lookups = stats.lookups,
        hits = stats.hits,
        hit_rate = %format!("{:.2}%", stats.hit_rate() * 100.0),
        size = stats.size,
        evictions = evictions.load(Ordering::Relaxed),
        dropped_notifications = cache.dropped_notifications(),
        "Workload finished"
    );

    cache.close();
    Ok(())
}

/// Waits for every workload task to finish, returning how many failed.
async fn join_workers(handles: Vec<tokio::task::JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for (task, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!(task, error = %e, "Workload task failed");
            failed += 1;
        }
    }
    failed
}
