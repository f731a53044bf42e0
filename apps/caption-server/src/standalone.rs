use crate::{
    config::ServerConfig,
    routes::{get_routes, AppState},
};
use ai::{acquire_session, SessionInfo};
use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};

pub async fn start_server() -> anyhow::Result<()> {
    analytics_tracing::load_dotenv();

    let config = ServerConfig::from_env()?;

    match &config.log_dir {
        Some(log_dir) => analytics_tracing::init_tracing_to_file(log_dir),
        None => analytics_tracing::init_tracing_to_stdout(),
    }

    // without a model there is nothing to serve, fail before binding
    let session = acquire_session(&config.session)
        .await
        .context("failed to load caption model")?;
    let session_info = SessionInfo::from(session.as_ref());
    tracing::info!(
        "{} ready on {}",
        session_info.model_id,
        session_info.device
    );

    let state = AppState {
        captioner: session,
        session_info,
    };

    let app = get_routes(state, config.max_upload_bytes).layer(
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any),
    );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl-C received, shut down...");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, shut down...");
        },
    }
}
