use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "./taskboard.toml";

/// Placeholder secret; the server warns at startup when it is still in use.
pub const DEV_JWT_SECRET: &str = "CHANGE_THIS_IN_PRODUCTION";

/// Command-line flags. Only flags that were actually passed are serialized,
/// so an omitted flag never shadows the TOML file or the environment.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "taskboard-server", version, about = "Taskboard API server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file [default: ./taskboard.toml]
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// HS256 secret for signing and verifying access tokens
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expire_minutes: Option<i64>,
}

impl Cli {
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH)
    }
}

/// Effective server settings after all layers are merged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    /// Origins allowed by CORS (TOML or TASKBOARD_CORS_ORIGINS only)
    pub cors_origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_expire_minutes: 30,
            cors_origins: default_cors_origins(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TASKBOARD_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::layered(Toml::file(cli.config_path()), cli).extract()
    }

    /// The merge chain behind [`Config::load`], with the file layer supplied by the caller.
    pub fn layered(file: impl Provider, cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Env::prefixed("TASKBOARD_"))
            .merge(Serialized::defaults(cli.clone()))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Taskboard Server Configuration
# Place this file at ./taskboard.toml or specify with --config <path>
# All settings can be overridden via environment variables (TASKBOARD_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# HS256 secret for access tokens. Generate one with: openssl rand -hex 32
# jwt_secret = "CHANGE_THIS_IN_PRODUCTION"

# Access token lifetime in minutes (default: 30)
# access_token_expire_minutes = 30

# Origins allowed to call the API from a browser
# cors_origins = ["http://localhost:3000", "http://localhost:3001"]
"#
    .to_string()
}
