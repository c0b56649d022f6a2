//! tabdeck entry point.
//!
//! Opens the dashboard on the configured medium, prints what a new tab
//! would show, then keeps the external-change watcher and image rotation
//! running until interrupted.

use tabdeck_core::{subscriber, Notification, PubSubEvent};
use tabdeck_dashboard::models::ImageModel;
use tabdeck_dashboard::telemetry::{init_tracing, LogFormat};
use tabdeck_dashboard::todo::select_active_category_items;
use tabdeck_dashboard::{Dashboard, DashboardConfig, DashboardError};

#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    let config = DashboardConfig::load()?;
    init_tracing(&config.log_filter, LogFormat::Pretty)?;

    let dashboard = Dashboard::open(&config)?;
    dashboard
        .notifications()
        .event()
        .subscribe(subscriber(|n: &Notification| eprintln!("[{:?}] {}", n.level, n.message)))?;

    let settings = dashboard.settings_view()?;
    settings.initialized().await;
    let to_do = dashboard.to_do()?;
    to_do.manager().initialized().await;

    let quote = dashboard.quote_cache().get_item().await?;
    println!("\"{}\" ({})", quote.text, quote.author);
    if let Some(settings) = settings.data() {
        println!("{settings:?}");
    }
    for item in select_active_category_items(to_do.state().as_ref()) {
        println!("[{}] {}", if item.is_completed { "x" } else { " " }, item.title);
    }

    let rotation = dashboard.start_image_rotation();
    rotation
        .images()
        .subscribe(subscriber(|image: &ImageModel| println!("background: {}", image.source)))?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
    }
    tracing::info!("Shutting down");
    Ok(())
}
