use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use twolane_auth::{AuthConfig, MIN_SECRET_LEN};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub db_url: String,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub db_timeout_ms: u64,
    pub db_max_connections: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_auth_per_window: u32,
    pub metrics_require_auth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl ApiConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("TWOLANE_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("TWOLANE_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3001),
            "TWOLANE_BIND_ADDR",
        )?;

        let dev_allow_nonlocal_bind =
            parse_bool(kv.get("TWOLANE_DEV_ALLOW_NONLOCAL_BIND")).unwrap_or(false);
        if !bind_addr.ip().is_loopback()
            && !(dev_allow_nonlocal_bind && is_unspecified_ip(bind_addr.ip()))
        {
            return Err(StartupError {
                code: "ERR_NONLOCAL_BIND",
                message: "non-local bind requires TWOLANE_DEV_ALLOW_NONLOCAL_BIND and an unspecified address"
                    .to_string(),
            });
        }

        let db_url = require_nonempty(kv, "TWOLANE_DB_URL")?;

        let jwt_secret = require_nonempty(kv, "TWOLANE_JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: format!("TWOLANE_JWT_SECRET must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let token_ttl_secs = parse_u64(
            kv.get("TWOLANE_TOKEN_TTL_SECS"),
            24 * 60 * 60,
            "TWOLANE_TOKEN_TTL_SECS",
        )?;
        if token_ttl_secs < 60 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "TWOLANE_TOKEN_TTL_SECS must be >= 60".to_string(),
            });
        }

        let db_timeout_ms = parse_u64(
            kv.get("TWOLANE_DB_TIMEOUT_MS"),
            2000,
            "TWOLANE_DB_TIMEOUT_MS",
        )?;
        if db_timeout_ms == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "TWOLANE_DB_TIMEOUT_MS must be >= 1".to_string(),
            });
        }

        let db_max_connections = parse_u32(
            kv.get("TWOLANE_DB_MAX_CONNECTIONS"),
            8,
            "TWOLANE_DB_MAX_CONNECTIONS",
        )?;
        if !(1..=256).contains(&db_max_connections) {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "TWOLANE_DB_MAX_CONNECTIONS must be between 1 and 256".to_string(),
            });
        }

        let rate_limit_window_secs = parse_u64(
            kv.get("TWOLANE_RATE_LIMIT_WINDOW_SECS"),
            60,
            "TWOLANE_RATE_LIMIT_WINDOW_SECS",
        )?;
        let rate_limit_auth_per_window = parse_u32(
            kv.get("TWOLANE_RATE_LIMIT_AUTH_PER_WINDOW"),
            20,
            "TWOLANE_RATE_LIMIT_AUTH_PER_WINDOW",
        )?;

        let metrics_require_auth =
            parse_bool(kv.get("TWOLANE_METRICS_REQUIRE_AUTH")).unwrap_or(false);

        Ok(Self {
            bind_addr,
            db_url,
            jwt_secret,
            token_ttl_secs,
            db_timeout_ms,
            db_max_connections,
            rate_limit_window_secs,
            rate_limit_auth_per_window,
            metrics_require_auth,
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            clock_skew: Duration::from_secs(30),
        }
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_millis(self.db_timeout_ms)
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;
    parse_kv_lines(&contents)
}

fn parse_kv_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    kv.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StartupError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        })
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

fn parse_u32(value: Option<&String>, default: u32, key: &'static str) -> Result<u32, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<u32>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

fn parse_bool(value: Option<&String>) -> Option<bool> {
    let value = value.map(|v| v.trim()).filter(|v| !v.is_empty())?;

    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn is_unspecified_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_unspecified(),
    }
}
