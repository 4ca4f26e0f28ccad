//! `barebone replay` handler.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use barebone_config::TrackerConfig;
use barebone_core::{deliver, EventQueue, LogSink, Tracker, TrackerServices};
use barebone_protocols::EventSink;
use barebone_sink_http::HttpSink;

use crate::scenario::{Scenario, ScenarioRunner};
use crate::store::open_store;

/// Replay a scenario and report how many events were delivered.
pub(crate) async fn handle_replay(
    config: TrackerConfig,
    scenario_path: &Path,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(scenario_path)?;
    let mut runner = ScenarioRunner::build(&scenario, &config.marker_attribute)?;

    let sink: Arc<dyn EventSink> = if dry_run {
        Arc::new(LogSink::new())
    } else {
        Arc::new(HttpSink::from_config(&config)?)
    };
    info!("Replaying {} step(s) into sink '{}'", scenario.steps.len(), sink.name());

    let (queue, stream) = EventQueue::channel();
    let delivery = tokio::spawn(deliver(stream, sink));

    let services = TrackerServices {
        host: runner.document().clone(),
        store: open_store(&config),
        queue,
    };

    let result = match Tracker::start(&config, services) {
        Some(tracker) => {
            runner.document().flush();
            let mut result = Ok(());
            for step in &scenario.steps {
                if let Err(e) = runner.apply(step, &tracker) {
                    result = Err(e);
                    break;
                }
            }
            tracker.teardown();
            result
        }
        None => {
            warn!("Nothing to replay: tracking is disabled");
            Ok(())
        }
    };

    let stats = delivery.await?;
    println!(
        "Delivered {} event(s), {} failed",
        stats.sent, stats.failed
    );
    result?;
    Ok(())
}
