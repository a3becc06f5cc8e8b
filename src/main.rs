use schoold::api::set_expose_stacks;
use schoold::{build_router, AppState, Config};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    set_expose_stacks(!config.production);

    let conn = schoold::db::open_db(&config.data_dir)?;
    let bind_addr = config.bind_addr;
    let state = AppState::new(conn, config);
    let app = build_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "schoold listening");
    axum::serve(listener, app).await?;
    Ok(())
}
