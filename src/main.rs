// Service binary: wires in-memory stores, starts the recompute worker, and
// runs the periodic convergence sweep over a trailing window.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use dtr_core::clock::SystemClock;
use dtr_core::config::AppConfig;
use dtr_core::gate::AllowAllGeofence;
use dtr_core::orchestrator;
use dtr_core::registry::EmployeeRegistry;
use dtr_core::service::AttendanceService;
use dtr_core::store::Stores;
use dtr_core::timeutil::local_date;
use dtr_core::PolicyDefaults;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    let tz = config.tz()?;
    info!(timezone = %config.timezone, "starting dtr-core");

    let stores = Stores::in_memory();
    let registry = EmployeeRegistry::new(PolicyDefaults::default());
    let clock = Arc::new(SystemClock);
    let service = Arc::new(AttendanceService::new(
        stores,
        registry,
        clock.clone(),
        Arc::new(AllowAllGeofence),
        tz,
        config.retry_policy(),
        Duration::from_millis(config.gate_deadline_ms),
    ));

    tokio::spawn(orchestrator::run_worker(service.orchestrator()));

    let sweep_service = service.clone();
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    let window_days = config.sweep_window_days;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let today = local_date(chrono::Utc::now(), tz);
            let start = today - ChronoDuration::days(window_days);
            for employee_id in sweep_service.registry().all_employee_ids() {
                sweep_service.sweep(&employee_id, start, today).await;
            }
            info!("convergence sweep finished");
        }
    });

    info!("dtr-core running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
