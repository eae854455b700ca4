use smart_intersection::config::ControllerConfig;
use smart_intersection::control_system::{run_control_loop, ControlLoop};
use smart_intersection::detection::{SimulatedDetector, SimulationProfile};
use smart_intersection::publisher::{open_store, PublisherSettings, StatePublisher};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match ControllerConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Starting intersection controller (store: {:?}, gate threshold {}, cycle {}s, cooldown {}s)",
        config.store.backend,
        config.lane_gate_threshold,
        config.cycle_interval_secs,
        config.emergency_cooldown_secs
    );

    let store = open_store(&config.store);
    let publisher = StatePublisher::spawn(store, PublisherSettings::from_config(&config));
    let control = ControlLoop::new(&config, Instant::now());

    let seed = std::env::var("INTERSECTION_SIM_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0x5EED);
    let detector = SimulatedDetector::new(seed, SimulationProfile::default());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Cannot listen for Ctrl-C: {}", e);
            return;
        }
        ctrl_c.cancel();
    });

    run_control_loop(control, detector, publisher, &config, cancel).await;
    log::info!("System shutdown");
    ExitCode::SUCCESS
}
