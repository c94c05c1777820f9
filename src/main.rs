use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courseshop_web::{app, cache, config::AppConfig, db, shop::accounts, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courseshop_web=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let store = db::connect(&config)
        .await
        .context("Failed to open the store")?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        accounts::ensure_staff_account(store.as_ref(), email, password)
            .await
            .context("Failed to prepare the staff account")?;
    }

    let address = config.bind_address();
    let state = AppState::new(store, config);

    tokio::spawn(cache::start_cache_warmer(
        state.cache.clone(),
        state.store.clone(),
    ));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Listening on http://{}", address);

    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}
