use mock_oidc::{MockProvider, DEFAULT_MODELS, DEFAULT_USERNAME};
use tracing_subscriber::EnvFilter;

/// Listen address; override with `MOCK_OIDC_ADDR`.
const DEFAULT_ADDR: &str = "127.0.0.1:4000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr = std::env::var("MOCK_OIDC_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();

    let provider = MockProvider::new(format!("http://localhost:{port}"))?;

    tracing::info!(base_url = provider.base_url(), "mock provider listening");
    tracing::info!(
        "AUTHORITY={}  API_BASE={}  models={:?}  user={}",
        provider.authority("mock-tenant"),
        provider.api_base(),
        DEFAULT_MODELS,
        DEFAULT_USERNAME,
    );

    axum::serve(listener, provider.router()).await?;
    Ok(())
}
