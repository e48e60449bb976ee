use std::time::Duration;

use clap::Parser;
use tollgate::cli::{Args, init_logging, load_token_secret, open_database};
use tollgate::{ServerConfig, init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(token_secret) = load_token_secret(args.secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    init_cleanup(&db).await;

    let config = ServerConfig {
        db,
        token_secret,
        access_ttl_secs: args.access_ttl_secs,
        refresh_ttl_secs: args.refresh_ttl_secs,
        store_timeout: Duration::from_millis(args.store_timeout_ms),
        rotate_on_reissue: args.rotate_on_reissue,
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
