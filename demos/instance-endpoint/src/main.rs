use femur::prelude::*;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod my_endpoint;

use my_endpoint::MyEndpoint;

#[derive(Clone)]
struct AppState {
    container: Arc<Container>,
}

impl HasContainer for AppState {
    fn get_container(&self) -> &Container {
        &self.container
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,femur=debug")),
        )
        .init();

    let config = ConfigService::new();

    // Endpoint components are transient: every request gets a fresh instance.
    let container = ContainerBuilder::new()
        .register(config.clone())
        .injectable::<MyEndpoint>()
        .build();
    let state = AppState {
        container: Arc::new(container),
    };

    let registry = Arc::new(InvokerRegistry::from_config(&config));
    let mut endpoints = EndpointRouteBuilder::with_router(
        Router::<AppState>::new().route("/standard", axum::routing::get(my_endpoint::standard)),
        registry,
    )
    .options(RegistrarOptions::from_config(&config));

    endpoints.map("/instance", [Method::GET], select!(MyEndpoint::handle_async))?;

    let description = endpoints.describe()?;
    let router = endpoints
        .into_router()
        .route(
            "/endpoints",
            axum::routing::get(move || {
                let description = description.clone();
                async move { Json(description) }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let host = config.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = config.get_or("PORT", 3000);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
