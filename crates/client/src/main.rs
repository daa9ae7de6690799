//! Ambient light client - terminal entry point
//!
//! Connects to the backend and logs what a UI would render: connection
//! state, LED status and preview update rate.

use ambient_client::{logging, AppContext, ClientConfig};
use ambient_shared::{event_types, ServerEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from_env();
    tracing::info!(http = %config.http_base_url, ws = %config.ws_url, "ambient client starting");

    let ctx = AppContext::new(config);

    match ctx.api().app_version().await {
        Ok(info) => tracing::info!(version = %info.version, dev = info.is_dev, "backend reachable"),
        Err(e) => tracing::warn!(error = %e, "backend version unavailable"),
    }

    let status = ctx.led_status_store();
    let preview = ctx.led_preview_store();
    let _navigate = ctx.events().on(event_types::NAVIGATE, |event| {
        if let ServerEvent::Navigate { path } = event {
            tracing::info!(%path, "backend requested navigation");
        }
    });

    ctx.initialize();
    if let Err(e) = status.seed(ctx.api()).await {
        tracing::warn!(error = %e, "could not load initial LED status");
    }

    let mut connection = ctx.events().watch_state();
    let mut led_status = status.watch();
    let mut preview_hz = preview.watch_frequency();

    loop {
        tokio::select! {
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = connection.borrow_and_update().clone();
                tracing::info!(?state, "connection state");
            }
            changed = led_status.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(current) = led_status.borrow_and_update().as_ref() {
                    let age_ms = (chrono::Utc::now() - current.last_updated).num_milliseconds();
                    tracing::info!(
                        mode = %current.data_send_mode,
                        packets = current.send_stats.total_packets_sent,
                        age_ms,
                        "LED status"
                    );
                }
            }
            changed = preview_hz.changed() => {
                if changed.is_err() {
                    break;
                }
                let hz = *preview_hz.borrow_and_update();
                let leds = preview.frame().led_count;
                tracing::info!(hz = %format!("{hz:.1}"), leds, "LED preview");
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("shutting down");
                break;
            }
        }
    }

    ctx.shutdown();
    Ok(())
}
