use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Gridscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "gridscribe=info,tower_http=warn"
}

/// Get the application data directory
/// ~/Gridscribe/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default directory for generated reports.
pub fn default_reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// Runtime settings, hydrated once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// OpenAI API key. A missing or blank key routes requests to Ollama.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    /// Sampling temperature passed to both backends.
    pub temperature: f32,
    /// Where generated reports are written.
    pub reports_dir: PathBuf,
    /// Listen address for the HTTP server.
    pub listen_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Self {
        let reports_dir = std::env::var("GRIDSCRIBE_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_reports_dir());
        let listen_addr = std::env::var("GRIDSCRIBE_ADDR")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(default_listen_addr);

        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "gpt-oss:20b"),
            temperature: 0.5,
            reports_dir,
            listen_addr,
        }
    }

    /// True when a usable OpenAI key is configured.
    pub fn openai_configured(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "gpt-oss:20b".to_string(),
            temperature: 0.5,
            reports_dir: default_reports_dir(),
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
