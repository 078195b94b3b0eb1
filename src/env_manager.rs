use log::{info, warn};
use std::env;

use crate::config::LLMProvider;
use crate::{calendar::google, llm};

// Names of optional environment variables
pub const OPTIONAL_ENV_VARS: &[&str] = &["RUST_LOG", "CALVOX_CONFIG_PATH"];

/// Load a `.env` file from the working directory or its parents, if there is one.
pub fn load_env_file() {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => info!("No .env file found or error loading it: {}", e),
    }
}

/// Secrets the current configuration needs, in the order they are checked.
pub fn required_env_vars(provider: LLMProvider, google_backend: bool) -> Vec<&'static str> {
    let mut vars = Vec::new();
    match provider {
        LLMProvider::Gemini => vars.push(llm::gemini::API_KEY_VAR),
        LLMProvider::OpenAI => vars.push(llm::openai::API_KEY_VAR),
        LLMProvider::None => {}
    }
    if google_backend {
        vars.push(google::TOKEN_ENV_VAR);
    }
    vars
}

pub fn is_set(name: &str) -> bool {
    env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Warn about unset variables and report whether everything was present.
pub fn check_env_vars(vars: &[&str]) -> bool {
    let mut all_present = true;
    for var in vars {
        if !is_set(var) {
            warn!("Environment variable {} is not set", var);
            all_present = false;
        }
    }
    all_present
}
