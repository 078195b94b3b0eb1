pub mod api_server;
pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod env_manager;
pub mod llm;
pub mod parser;
pub mod tools;
pub mod voice;

use anyhow::{Context, Result};
use log::info;
use serde_json::{json, Value};

use crate::app::{print_outcome, render, Application};
use crate::cli::{Cli, Commands, ConfigActions};
use crate::tools::{DELETE_EVENT, GET_NEXT_EVENT, LIST_CALENDARS};
use crate::voice::TerminalSource;

pub use config::Config;

/// Initialize a logger for tests and embedders that don't install their own.
pub fn init_logger() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .is_test(true)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Config { action }) => {
            match action {
                ConfigActions::Show => println!("{}", toml::to_string_pretty(&config)?),
                ConfigActions::Path => match &cli.config {
                    Some(path) => println!("{}", path.display()),
                    None => println!("{}", config::get_config_path()?.display()),
                },
            }
            Ok(())
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            Application::new(config)?.serve().await
        }
        Some(Commands::Say { words }) => {
            let app = Application::new(config)?;
            let outcome = app.say(&words.join(" ")).await;
            print_outcome(&outcome);
            Ok(())
        }
        Some(Commands::Next) => invoke_and_print(config, GET_NEXT_EVENT, json!({})).await,
        Some(Commands::Delete { summary, start, end, calendar, all_day }) => {
            let args = json!({
                "calendar_id": calendar,
                "summary": summary,
                "start_str": start,
                "end_str": end,
                "all_day": all_day,
            });
            invoke_and_print(config, DELETE_EVENT, args).await
        }
        Some(Commands::Calendars) => invoke_and_print(config, LIST_CALENDARS, json!({})).await,
        Some(Commands::Listen) | None => {
            let app = Application::new(config)?;
            let mut source = TerminalSource::new("📅 ").context("Failed to open terminal input")?;
            app.run(&mut source).await?;
            info!("Goodbye");
            Ok(())
        }
    }
}

async fn invoke_and_print(config: Config, tool: &str, args: Value) -> Result<()> {
    let app = Application::new(config)?;
    let result = match app.tools().invoke(tool, args).await {
        Ok(result) => result,
        Err(e) => e.to_result(),
    };
    println!("{}", render(&result));
    Ok(())
}
