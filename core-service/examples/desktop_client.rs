//! Sign in against a running server and print the unread notifications.
//!
//! ```text
//! JEXI_URL=http://localhost:8000/api/v1 JEXI_USER=alex JEXI_PASSWORD=secret \
//!     cargo run -p core-service --example desktop_client
//! ```

use anyhow::Context;
use core_runtime::events::{ClientEvent, NotificationEvent};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_desktop, DesktopOptions};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default()).context("logging")?;

    let base_url = env::var("JEXI_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1".into());
    let data_dir = env::temp_dir().join("jexi-desktop-client");
    let service = bootstrap_desktop(DesktopOptions::new(base_url, data_dir)).await?;
    service.watch_connectivity()?;

    if !service.is_logged_in().await {
        let user = env::var("JEXI_USER").context("JEXI_USER is not set")?;
        let password = env::var("JEXI_PASSWORD").context("JEXI_PASSWORD is not set")?;
        let credentials = service.login(&user, &password).await?;
        println!("signed in (admin: {})", credentials.is_admin);
    }

    let mut events = service
        .subscribe()
        .filter(|e| matches!(e, ClientEvent::Notifications(_)));
    let report = service.poller().run_once().await?;
    println!("{} unread", report.unread);

    for event in events.drain() {
        if let ClientEvent::Notifications(NotificationEvent::UnreadChanged { items, .. }) = event {
            for item in items {
                println!("{} {}  {}", item.icon, item.title, item.message);
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
