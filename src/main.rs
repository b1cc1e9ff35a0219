//! Desktop entry point

use locachat::app::App;
use locachat::system::gpu;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("locachat=info")),
        )
        .init();

    tracing::info!("Starting locachat ({} backend)", gpu::backend_name());

    dioxus::launch(App);
}
