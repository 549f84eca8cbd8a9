use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{
    errors::Error,
    qr::{ErrorCorrection, QrOptions, DEFAULT_MAX_DECODE_DIM},
    Result,
};

/// Telegram's download ceiling for bots.
const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Typed configuration, built once at startup and shared with the adapter.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    /// Empty means the bot answers everyone.
    pub telegram_allowed_users: Vec<i64>,

    // QR rendering
    pub qr: QrOptions,
    /// Longest image side used for detection; `0` keeps full resolution.
    pub max_decode_dim: u32,
    pub max_image_bytes: u64,

    // Telegram limits
    pub telegram_message_limit: usize,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    /// Load from the process environment, after merging a local `.env` file.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let telegram_allowed_users =
            parse_csv_i64("TELEGRAM_ALLOWED_USERS", get("TELEGRAM_ALLOWED_USERS"))?;

        let module_size = parse::<u32>("QR_MODULE_SIZE", get("QR_MODULE_SIZE"))?.unwrap_or(10);
        if !(1..=64).contains(&module_size) {
            return Err(Error::Config(format!(
                "QR_MODULE_SIZE must be between 1 and 64, got {module_size}"
            )));
        }
        let border = parse::<u32>("QR_BORDER", get("QR_BORDER"))?.unwrap_or(4);
        if border > 16 {
            return Err(Error::Config(format!(
                "QR_BORDER must be at most 16, got {border}"
            )));
        }
        let error_correction = match get("QR_ERROR_CORRECTION") {
            Some(s) => s.parse::<ErrorCorrection>().map_err(Error::Config)?,
            None => ErrorCorrection::default(),
        };

        let max_decode_dim = parse::<u32>("QR_MAX_DIM", get("QR_MAX_DIM"))?
            .unwrap_or(DEFAULT_MAX_DECODE_DIM);

        let max_image_bytes = parse::<u64>("MAX_IMAGE_BYTES", get("MAX_IMAGE_BYTES"))?
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);

        let telegram_message_limit =
            parse::<usize>("TELEGRAM_MESSAGE_LIMIT", get("TELEGRAM_MESSAGE_LIMIT"))?
                .unwrap_or(4096)
                .max(64);

        let audit_log_path = get("AUDIT_LOG_PATH").map(PathBuf::from);
        let audit_log_json = parse_bool(get("AUDIT_LOG_JSON")).unwrap_or(false);

        let rate_limit_enabled = parse_bool(get("RATE_LIMIT_ENABLED")).unwrap_or(true);
        let rate_limit_requests =
            parse::<u32>("RATE_LIMIT_REQUESTS", get("RATE_LIMIT_REQUESTS"))?.unwrap_or(20);
        let rate_limit_window = Duration::from_secs(
            parse::<u64>("RATE_LIMIT_WINDOW", get("RATE_LIMIT_WINDOW"))?.unwrap_or(60),
        );

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            qr: QrOptions {
                module_size,
                border,
                error_correction,
            },
            max_decode_dim,
            max_image_bytes,
            telegram_message_limit,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse<T: FromStr>(key: &str, v: Option<String>) -> Result<Option<T>> {
    let Some(v) = v else {
        return Ok(None);
    };
    v.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {v}")))
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_csv_i64(key: &str, v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key} has an invalid user id: {s}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
