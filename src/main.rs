use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use calvox::cli::Cli;
use calvox::env_manager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with custom format
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    env_manager::load_env_file();

    let cli = Cli::parse();
    calvox::run(cli).await
}
