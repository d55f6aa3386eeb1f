mod cli_config;

pub use cli_config::{ClixenConfig, n8n_api_key, openai_api_key};
