use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tactus::config::{DistributionConfig, PatternConfig};
use tactus::sequencer::drain_observations;
use tactus::{Conductor, Sequencer, TactusConfig, TactusResult, TracingOutput, load_config};
use tracing_subscriber::EnvFilter;

// Default session length when none is given on the command line
const DEFAULT_RUN_SECONDS: u64 = 8;

// How often observed events are summarized
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Kick on a 4-over-16 Euclidean rhythm, plus a hi-hat accelerating
/// through each phrase behind a playing/silent gate
fn demo_config() -> TactusConfig {
    let gate = BTreeMap::from([
        (
            "playing".to_string(),
            BTreeMap::from([("playing".to_string(), 0.8), ("silent".to_string(), 0.2)]),
        ),
        (
            "silent".to_string(),
            BTreeMap::from([("playing".to_string(), 0.5), ("silent".to_string(), 0.5)]),
        ),
    ]);

    TactusConfig {
        patterns: vec![
            PatternConfig {
                name: "kick".to_string(),
                distribution: DistributionConfig::Euclidean {
                    pulses: 4,
                    steps: None,
                    rotation: 0,
                },
                params: BTreeMap::from([("midi_note".to_string(), 36.0), ("amp".to_string(), 0.9)]),
                gate: None,
                seed: None,
            },
            PatternConfig {
                name: "hat".to_string(),
                distribution: DistributionConfig::Accelerando {
                    events: 6,
                    curve: 2.0,
                },
                params: BTreeMap::from([("midi_note".to_string(), 42.0), ("amp".to_string(), 0.5)]),
                gate: Some(gate),
                seed: Some(7),
            },
        ],
        ..TactusConfig::default()
    }
}

#[tokio::main]
async fn main() -> TactusResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Usage: tactus [config.ron|config.json] [seconds]
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => load_config(path)?,
        None => demo_config(),
    };
    let run_for = Duration::from_secs(
        args.next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RUN_SECONDS),
    );

    let conductor = Conductor::new(config.conductor_config()?);
    let (sequencer, mut observations) = Sequencer::new(
        conductor.clone(),
        Arc::new(TracingOutput::new()),
        config.dispatch_config()?,
    )?;
    for pattern in &config.patterns {
        sequencer.add_pattern(Box::new(pattern.build(conductor.position())?));
    }

    sequencer.start()?;

    // Push the tempo up for the second half of the session
    let rate = conductor.rate_handle();
    let started = tokio::time::Instant::now();
    let mut accelerated = false;

    while started.elapsed() < run_for {
        tokio::time::sleep(REPORT_INTERVAL).await;

        let observed = drain_observations(&mut observations);
        let worst = observed.iter().map(|o| o.lateness()).max().unwrap_or_default();
        tracing::info!(
            "{} events observed, worst lateness {:?}, tick {} (phrase position {})",
            observed.len(),
            worst,
            conductor.tick_count(),
            conductor.tick_in_phrase()
        );

        if !accelerated && started.elapsed() >= run_for / 2 {
            rate.propose(1.25);
            accelerated = true;
        }

        if let Some(err) = sequencer.fatal_error() {
            tracing::error!("Session halted: {}", err);
            break;
        }
    }

    sequencer.shutdown();

    let stats = sequencer.stats();
    tracing::info!(
        "Dispatched {} events ({} adapter failures, {} retries, {} dropped, {} generation failures)",
        stats.dispatched(),
        stats.adapter_failures(),
        stats.retries(),
        stats.dropped_events(),
        stats.generation_failures()
    );
    Ok(())
}
