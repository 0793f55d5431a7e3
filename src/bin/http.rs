#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::{net::SocketAddr, sync::Arc};

    use parking_lot::RwLock;
    use reminder_tool::{ReminderConfig, http_api, load_config};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reminder_tool=info,http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::var("REMINDER_TOOL_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => ReminderConfig::default(),
    };
    let addr: SocketAddr = std::env::var("REMINDER_TOOL_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let shared = Arc::new(RwLock::new(config));
    #[cfg(feature = "sqlite")]
    daily::spawn(shared.clone());

    tracing::info!(%addr, "reminder-tool HTTP API listening");
    http_api::serve_shared(addr, shared).await?;
    Ok(())
}

#[cfg(all(feature = "http_api", feature = "sqlite"))]
mod daily {
    use std::sync::Arc;

    use chrono::Utc;
    use parking_lot::RwLock;
    use reminder_tool::{
        LogNotifier, ReminderConfig, SqliteSubscriptionStore, persistence::load_catalog_from_csv,
        run_sweep,
    };
    use tracing::{info, warn};

    /// Run the sweep once a day at the configured local time.
    ///
    /// Only started when both a catalog and a database are configured.
    pub fn spawn(config: Arc<RwLock<ReminderConfig>>) {
        let configured = {
            let guard = config.read();
            guard.catalog_path.is_some() && guard.database_path.is_some()
        };
        if !configured {
            info!("catalog_path or database_path not set; daily sweep disabled");
            return;
        }

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = config.read().next_notify_at(now);
                let wait = (next.with_timezone(&Utc) - now)
                    .to_std()
                    .unwrap_or_default();
                info!(next = %next, "next reminder sweep scheduled");
                tokio::time::sleep(wait).await;

                let snapshot = config.read().clone();
                let outcome = tokio::task::spawn_blocking(move || sweep_once(&snapshot)).await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "reminder sweep failed"),
                    Err(err) => warn!(error = %err, "reminder sweep task panicked"),
                }
            }
        });
    }

    fn sweep_once(config: &ReminderConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (Some(catalog_path), Some(database_path)) = (&config.catalog_path, &config.database_path)
        else {
            return Ok(());
        };
        let catalog = load_catalog_from_csv(catalog_path)?;
        let store = SqliteSubscriptionStore::new(database_path)?;
        let today = config.today(Utc::now());
        run_sweep(&catalog, &store, today, config, &LogNotifier)?;
        Ok(())
    }
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
