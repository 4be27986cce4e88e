use branch_flow::advisory::remote::RemoteAdvisor;
use branch_flow::engine::VisitEngine;
use branch_flow::store::memory::MemoryStore;
use branch_flow::{api, config, scheduler, state};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        app = %config.app.name,
        config_path = config::DEFAULT_CONFIG_PATH,
        "branch-flow starting"
    );

    let settings = config.engine_settings()?;
    let branches = config.branches();
    tracing::info!(
        branches = branches.len(),
        capacity = settings.slot_capacity,
        scale = ?settings.crowd_scale,
        queue_scope = ?settings.queue_scope,
        "Engine configured"
    );
    let engine = VisitEngine::new(settings, branches, Arc::new(MemoryStore::new()))?;

    let mut app_state = state::AppState::new(engine);
    match config.advisory_endpoint() {
        Some(endpoint) => {
            tracing::info!(endpoint, "Advisory narration enabled");
            app_state = app_state.with_advisor(Arc::new(RemoteAdvisor::new(
                endpoint.to_string(),
                config.advisory_timeout(),
            )));
        }
        None => tracing::info!("No advisory endpoint configured, using local narration"),
    }
    let state = Arc::new(RwLock::new(app_state));

    let stop_flag = Arc::new(AtomicBool::new(false));
    let tick_handle = scheduler::spawn_tick_thread(
        Arc::clone(&state),
        config.tick_interval(),
        Arc::clone(&stop_flag),
    );

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    stop_flag.store(true, Ordering::Relaxed);
    if tick_handle.join().is_err() {
        tracing::error!("Tick thread panicked");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::config;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let config = config::load_default()?;
        config.engine_settings()?;
        Ok(())
    }
}
