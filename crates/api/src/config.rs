use axum::http::HeaderValue;
use fold_pipeline::config::ConfigError;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins from the comma-separated `CORS_ORIGINS` env var.
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Bound on each lookup behind `/gpu-info`, in seconds (default: `20`).
    /// Kept below `request_timeout_secs` so the endpoint answers before the
    /// request is cut off.
    pub gpu_info_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default   |
    /// |------------------------|-----------|
    /// | `HOST`                 | `0.0.0.0` |
    /// | `PORT`                 | `5000`    |
    /// | `CORS_ORIGINS`         | `*`       |
    /// | `REQUEST_TIMEOUT_SECS` | `30`      |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`      |
    /// | `GPU_INFO_TIMEOUT_SECS`| `20`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 5000)?;

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
        )?;

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", 30)?;
        let gpu_info_timeout_secs = check_gpu_info_timeout(
            env_parse("GPU_INFO_TIMEOUT_SECS", 20)?,
            request_timeout_secs,
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            gpu_info_timeout_secs,
        })
    }

    /// `true` when any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// The diagnostics bound must be non-zero and shorter than the request timeout.
fn check_gpu_info_timeout(secs: u64, request_timeout_secs: u64) -> Result<u64, ConfigError> {
    if secs == 0 || secs >= request_timeout_secs {
        return Err(ConfigError::Invalid {
            var: "GPU_INFO_TIMEOUT_SECS",
            value: secs.to_string(),
        });
    }
    Ok(secs)
}

/// Split a comma-separated origin list, rejecting values that cannot be
/// used as a header.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    for origin in &origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: origin.clone(),
            });
        }
    }
    Ok(origins)
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
