mod handlers;
mod server;


use clap::{Args, Parser, Subcommand};
use lockd_core::CoordinatorConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lockd",
    about = "lockd: lease-based distributed lock coordinator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the lockd HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100", env = "LOCKD_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "LOCKD_HOST")]
        host: String,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "LOCKD_STORAGE")]
        storage: String,

        /// Requests processed concurrently before callers queue
        #[arg(long, default_value = "1024", env = "LOCKD_MAX_CONCURRENT_REQUESTS")]
        max_concurrent_requests: usize,

        #[command(flatten)]
        coordinator: CoordinatorArgs,
    },

    /// Print version information
    Version,
}

#[derive(Args)]
struct CoordinatorArgs {
    /// Lease TTL applied when a request names none (seconds)
    #[arg(long, default_value = "30", env = "LOCKD_DEFAULT_TIMEOUT")]
    default_timeout: u64,

    /// Upper bound on any requested TTL (seconds)
    #[arg(long, default_value = "300", env = "LOCKD_MAX_TIMEOUT")]
    max_timeout: u64,

    /// Period of the auto-renewal pass (seconds)
    #[arg(long, default_value = "5", env = "LOCKD_RENEWAL_INTERVAL")]
    renewal_interval: u64,

    /// Period of the deadlock detector (seconds)
    #[arg(long, default_value = "10", env = "LOCKD_DETECTION_INTERVAL")]
    detection_interval: u64,

    /// Store poll period while waiting on a held lock (milliseconds)
    #[arg(long, default_value = "100", env = "LOCKD_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Disable the background deadlock detector
    #[arg(long, env = "LOCKD_DISABLE_DEADLOCK_DETECTION")]
    disable_deadlock_detection: bool,
}

impl From<CoordinatorArgs> for CoordinatorConfig {
    fn from(args: CoordinatorArgs) -> Self {
        CoordinatorConfig {
            default_timeout_seconds: args.default_timeout,
            max_timeout_seconds: args.max_timeout,
            renewal_interval_seconds: args.renewal_interval,
            detection_interval_seconds: args.detection_interval,
            poll_interval_milliseconds: args.poll_interval_ms,
            deadlock_detection_enabled: !args.disable_deadlock_detection,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            max_concurrent_requests,
            coordinator,
        } => {
            if let Err(e) = server::run(
                &host,
                port,
                &storage,
                coordinator.into(),
                max_concurrent_requests,
            )
            .await
            {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("lockd {}", env!("CARGO_PKG_VERSION"));
            println!("Lease-based distributed lock coordinator");
        }
    }
}
