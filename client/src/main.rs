use clap::Parser;
use client::network::{RobotClient, RobotConfig};
use client::robot::SimulatedRobot;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Username sent at login
    #[arg(short, long, default_value = "Robot")]
    username: String,

    /// Index into the key table
    #[arg(short, long, default_value_t = 0)]
    key_id: u32,

    /// Seed for robot and obstacle placement, random if omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Placement range on both axes
    #[arg(short, long, default_value_t = 10)]
    range: i32,

    /// Number of obstacle cells
    #[arg(short, long, default_value_t = 0)]
    obstacles: usize,

    /// Split every message into writes of this many bytes
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Message handed over at the origin
    #[arg(long, default_value = "Secret message")]
    secret: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut robot = SimulatedRobot::random(&mut rng, args.range, args.obstacles);
    info!(
        "Robot starts at {} facing {} with {} obstacles",
        robot.position(),
        robot.heading(),
        robot.obstacles().len()
    );

    let config = RobotConfig {
        username: args.username.into_bytes(),
        key_id: args.key_id,
        secret: args.secret.into_bytes(),
        chunk_size: args.chunk_size,
        ..RobotConfig::default()
    };

    let client = RobotClient::connect(&args.server, config).await?;
    let summary = client.run(&mut robot).await?;

    info!(
        "Done: {} commands, {} bumps",
        summary.commands,
        robot.bumps()
    );

    Ok(())
}
