use clap::Parser;
use log::info;
use server::config::{ServerConfig, DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS};
use server::network::Server;
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Close connections idle for this many milliseconds
    #[arg(short = 't', long, default_value = "1000")]
    idle_timeout_ms: u64,

    /// Maximum number of simultaneous robots
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
}

/// Parses command-line arguments, then runs the server until it fails or
/// Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        idle_timeout: Duration::from_millis(args.idle_timeout_ms),
        max_connections: args.max_connections,
    };

    let mut server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
