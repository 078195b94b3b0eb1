use anyhow::Result;
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::calendar::{create_backend, CalendarService};
use crate::config::{BackendKind, Config};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::env_manager;
use crate::llm::{create_function_caller, FunctionCaller};
use crate::parser::{CommandParser, NaturalDateParser};
use crate::tools::ToolRegistry;
use crate::voice::{Heard, TranscriptSource};

pub struct Application {
    config: Config,
    tools: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
}

impl Application {
    /// Wire the configured backend and language model.
    pub fn new(config: Config) -> Result<Self> {
        env_manager::check_env_vars(&env_manager::required_env_vars(
            config.language_model.provider,
            config.calendar.backend == BackendKind::Google,
        ));

        let backend = create_backend(&config)?;
        let service = Arc::new(CalendarService::new(backend, &config.calendar)?);
        let llm = match create_function_caller(&config) {
            Ok(llm) => llm,
            Err(e) => {
                warn!("Language model fallback disabled: {:#}", e);
                None
            }
        };
        Ok(Self::from_parts(config, service, llm))
    }

    pub fn from_parts(
        config: Config,
        service: Arc<CalendarService>,
        llm: Option<Arc<dyn FunctionCaller>>,
    ) -> Self {
        let parser = CommandParser::new(
            Arc::new(NaturalDateParser),
            service.aliases().clone(),
            service.settings().clone(),
        )
        .with_default_duration(service.default_duration());
        let tools = Arc::new(ToolRegistry::new(service));
        let dispatcher = Dispatcher::new(parser, tools.clone(), llm);
        Self { config, tools, dispatcher }
    }

    pub fn tools(&self) -> Arc<ToolRegistry> {
        self.tools.clone()
    }

    /// Tool endpoint in the background plus the serial command loop in the foreground.
    pub async fn run(&self, source: &mut dyn TranscriptSource) -> Result<()> {
        let addr = self.config.server.socket_addr()?;
        let tools = self.tools.clone();
        let api_handle = tokio::spawn(async move {
            if let Err(e) = crate::api_server::start_api_server(addr, tools).await {
                error!("API server error: {:?}", e);
            }
        });

        println!("Calendar assistant ready. Tool endpoint at http://{}", addr);
        println!("Try: 'Team meeting tomorrow at 10am' or 'Lunch with Sarah on Friday at noon'");

        let handled = self.command_loop(source).await;
        info!("Command loop finished after {} utterances", handled);

        api_handle.abort();
        Ok(())
    }

    /// Endpoint only.
    pub async fn serve(&self) -> Result<()> {
        crate::api_server::start_api_server(self.config.server.socket_addr()?, self.tools.clone()).await
    }

    /// One utterance at a time until the source closes. Returns how many were handled.
    pub async fn command_loop(&self, source: &mut dyn TranscriptSource) -> usize {
        let mut handled = 0;
        loop {
            match source.listen() {
                Heard::Utterance(text) => {
                    let outcome = self.dispatcher.dispatch(&text).await;
                    print_outcome(&outcome);
                    handled += 1;
                }
                Heard::Nothing => println!("Could not understand command."),
                Heard::Closed => break,
            }
        }
        handled
    }

    pub async fn say(&self, utterance: &str) -> DispatchOutcome {
        self.dispatcher.dispatch(utterance).await
    }
}

pub fn print_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::ToolInvoked { route, tool, result } => {
            println!("[{}] {}: {}", route, tool, render(result));
        }
        DispatchOutcome::Message { route, text } => println!("[{}] {}", route, text),
    }
}

pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
