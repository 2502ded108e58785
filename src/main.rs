use blog_api::config::Config;
use dotenv::dotenv;
use error_chain::ChainedError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("blog_api=info,rocket=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[rocket::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let rocket = match Config::from_env().and_then(blog_api::rocket) {
        Ok(rocket) => rocket,
        Err(e) => {
            error!("failed to start: {}", e.display_chain());
            std::process::exit(1);
        }
    };

    info!("starting blog api");
    if let Err(e) = rocket.launch().await {
        error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
