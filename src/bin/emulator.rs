//! JBOD Device Emulator Binary
//!
//! Serves an in-memory JBOD array over TCP.

use clap::Parser;
use jbodstore::network::DeviceServer;
use jbodstore::Config;
use tracing_subscriber::{fmt, EnvFilter};

/// JBOD device emulator
#[derive(Parser, Debug)]
#[command(name = "jbod-emulator")]
#[command(about = "Emulated JBOD array speaking the block protocol over TCP")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3333")]
    listen: String,

    /// Disk image loaded on start and saved when each session ends
    #[arg(short, long)]
    image: Option<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jbodstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("jbod-emulator v{}", jbodstore::VERSION);

    let mut builder = Config::builder().listen_addr(&args.listen);
    if let Some(image) = &args.image {
        tracing::info!("Disk image: {}", image);
        builder = builder.image_path(image);
    }
    let config = builder.build();

    let server = match DeviceServer::bind(&config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start emulator: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Emulator error: {}", e);
        std::process::exit(1);
    }
}
