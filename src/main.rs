use clap::{Parser, Subcommand};
use orderflow::service::{run_demo, SystemConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "orderflow", version, about = "Transactional-outbox order coordination", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a randomized create/pay/ship scenario and print final statuses
    Demo {
        /// Number of orders to create
        #[arg(short, long, default_value = "10", value_name = "COUNT")]
        orders: usize,

        /// Close delay for unpaid orders, in milliseconds
        #[arg(long, default_value = "2000", value_name = "MILLIS")]
        close_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orderflow=info".into()),
        )
        .init();

    let args = Cli::parse();

    match args.command {
        Commands::Demo {
            orders,
            close_delay_ms,
        } => {
            let config = SystemConfig {
                close_delay: Duration::from_millis(close_delay_ms),
                ..SystemConfig::default()
            };
            run_demo(config, orders).await?;
        }
    }

    Ok(())
}
