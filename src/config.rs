use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub upload: UploadConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model identifier for the LLM collaborators
    #[arg(long)]
    pub model: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000_i64)?
            .set_default("llm.model", "gpt-4")?
            .set_default("llm.temperature", 0.0_f64)?
            .set_default("upload.max_bytes", MAX_UPLOAD_BYTES as i64)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/chart-pilot/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // LLM credentials come from the process environment. Missing values
        // are tolerated at startup; LLM-backed requests will fail instead.
        if config.llm.api_key.is_none() {
            config.llm.api_key = env::var("OPENAI_API_KEY").ok();
        }
        if config.llm.api_url.is_none() {
            config.llm.api_url = env::var("OPENAI_API_BASE").ok();
        }
        if config.llm.organization.is_none() {
            config.llm.organization = env::var("OPENAI_ORGANIZATION_ID").ok();
        }

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                model: "gpt-4".to_string(),
                temperature: 0.0,
                api_key: None,
                api_url: None,
                organization: None,
            },
            upload: UploadConfig {
                max_bytes: MAX_UPLOAD_BYTES,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_deterministic_sampling() {
        let config = AppConfig::default();
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
    }
}
