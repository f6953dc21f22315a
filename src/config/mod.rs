// Configuration management module
// TOML settings for the Ollama services, retrieval tuning and the HTTP server

pub mod settings;


pub use settings::{
    Config, ConfigError, GenerationConfig, OllamaConfig, RetrievalConfig, ServerConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("# {}", config.get_base_dir().join("config.toml").display());
    println!("{}", rendered);
    Ok(())
}
