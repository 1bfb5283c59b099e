use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5001;
const STATE_FILE_NAME: &str = "bill_splitter_db.json";

/// Origins that may always call the API, besides `FRONTEND_URL`.
const KNOWN_ORIGINS: [&str; 2] = [
    "https://smart-bill-splitter.netlify.app",
    "http://localhost:3000",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    /// Where the bill is persisted
    pub db_file: PathBuf,
    /// Built frontend served for every non-API path
    pub static_dir: PathBuf,
    /// Extra CORS origin; `*` lets any origin in
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|port| port.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let debug = lookup("DEBUG")
            .map(|debug| debug.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // Heroku dynos only have a writable temp dir
        let db_file = if lookup("DYNO").is_some() {
            std::env::temp_dir().join(STATE_FILE_NAME)
        } else {
            lookup("DB_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(STATE_FILE_NAME))
        };

        Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            debug,
            db_file,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("build")),
            frontend_url: lookup("FRONTEND_URL").unwrap_or_else(|| "*".to_string()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.frontend_url.trim() == "*"
    }

    pub fn allowed_origins(&self) -> Vec<&str> {
        let mut origins = KNOWN_ORIGINS.to_vec();
        if !self.allows_any_origin() {
            origins.push(self.frontend_url.trim());
        }
        origins
    }

    /// Default `env_logger` filter, overridden by `RUST_LOG`.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
