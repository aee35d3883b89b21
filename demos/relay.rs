//! # Example: relay
//!
//! Producers on plain threads emit events before the consumer is listening;
//! the consumer mounts handlers later and every producer learns, through its
//! completion, when its event was handled.
//!
//! Shows how to:
//! - Emit from non-async threads with [`EventRelay::emit_fn`].
//! - Mount per-topic handlers with [`Dispatcher::mount`] (flushes the buffer).
//! - Defer an acknowledgment from inside a [`Handler`].
//! - Run the TTL sweeper next to the consumer loop.
//!
//! ## Flow
//! ```text
//! thread ──emit──► EventRelay ──(not ready)──► PendingBuffer
//!                      │
//!   Dispatcher::mount ─┴─► declare_ready ─► Deliveries ─► Dispatcher::run ─► Handler
//!                                                                        │
//!   completion (on producer's behalf) ◄── acknowledge(correlationID) ◄───┘
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example relay
//! ```

use std::sync::Arc;
use std::time::Duration;

use eventrelay::{
    Body, Delivery, Dispatcher, Disposition, EventRelay, Handler, HandlerFn, RelayConfig,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Acknowledges each tracking event after a short simulated write.
struct SlowTracker {
    relay: Arc<EventRelay>,
}

#[async_trait::async_trait]
impl Handler for SlowTracker {
    async fn handle(&self, event: Delivery) -> Disposition {
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Err(e) = relay.acknowledge(&event.correlation_id) {
                eprintln!("[tracker] late ack failed: {e}");
            }
        });
        Disposition::Deferred
    }

    fn name(&self) -> &str {
        "slow-tracker"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = RelayConfig {
        completion_ttl: Duration::from_secs(5),
        sweep_interval: Duration::from_secs(1),
        ..RelayConfig::default()
    };
    let (relay, deliveries) = EventRelay::new(cfg);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();

    // Producers start before anyone listens.
    let producers: Vec<_> = ["updates", "tracking"]
        .into_iter()
        .map(|topic| {
            let relay = Arc::clone(&relay);
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                for step in 0..3 {
                    let mut body = Body::new();
                    body.insert("step".into(), json!(step));
                    let done_tx = done_tx.clone();
                    let label = format!("{topic}#{step}");
                    if let Err(e) = relay.emit_fn(topic, body, move || {
                        let _ = done_tx.send(label);
                    }) {
                        eprintln!("[producer] {topic}: {e}");
                    }
                }
            })
        })
        .collect();
    for p in producers {
        p.join().map_err(|_| "producer thread panicked")?;
    }
    drop(done_tx);
    println!("[main] buffered before mount: {}", relay.stats().pending);

    let token = CancellationToken::new();
    let sweeper = relay.spawn_sweeper(token.clone());

    let dispatcher = Dispatcher::new(Arc::clone(&relay));
    let consumer = tokio::spawn(Arc::clone(&dispatcher).run(deliveries, token.clone()));

    let report = dispatcher.mount(
        "updates",
        HandlerFn::arc("updates", |ev: Delivery| async move {
            println!("[updates] step={} id={}", ev.body["step"], ev.correlation_id);
            Disposition::Processed
        }),
    );
    println!("[main] mounted {}: flushed={}", report.topic, report.flushed);

    let report = dispatcher.mount(
        "tracking",
        Arc::new(SlowTracker {
            relay: Arc::clone(&relay),
        }),
    );
    println!("[main] mounted {}: flushed={}", report.topic, report.flushed);

    while let Some(label) = done_rx.recv().await {
        println!("[producer] completion ran for {label}");
    }

    token.cancel();
    consumer.await?;
    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    println!("[main] stats: {}", serde_json::to_string(&relay.stats())?);
    Ok(())
}
