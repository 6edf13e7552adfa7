use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Cosine-distance tolerance for a positive match.
    pub match_tolerance: f32,
    /// Delay between consecutive capture attempts.
    pub poll_interval: Duration,
    /// Per-call timeout for notification HTTP requests.
    pub notify_timeout: Duration,
    /// Number of warmup frames to discard at startup.
    pub warmup_frames: usize,
    /// Path to the default chime audio file.
    pub chime_path: PathBuf,
    /// Slack incoming-webhook URL. Channel disabled when unset.
    pub slack_webhook_url: Option<String>,
    /// Telegram bot token. Telegram disabled unless both token and
    /// chat id are set.
    pub telegram_api_token: Option<String>,
    /// Telegram chat id to message.
    pub telegram_chat_id: Option<String>,
}

impl Config {
    /// Load configuration from `CHIME_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("CHIME_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| chime_face::default_model_dir());

        let db_path = std::env::var("CHIME_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| chime_store::default_db_path());

        Self {
            camera_device: std::env::var("CHIME_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            db_path,
            match_tolerance: env_f32("CHIME_MATCH_TOLERANCE", chime_core::DEFAULT_MATCH_TOLERANCE),
            poll_interval: Duration::from_secs(env_u64("CHIME_POLL_INTERVAL_SECS", 5)),
            notify_timeout: Duration::from_secs(env_u64("CHIME_NOTIFY_TIMEOUT_SECS", 5)),
            warmup_frames: env_usize("CHIME_WARMUP_FRAMES", 4),
            chime_path: std::env::var("CHIME_DEFAULT_CHIME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("default_chime.mp3")),
            slack_webhook_url: env_opt("SLACK_WEBHOOK_URL"),
            telegram_api_token: env_opt("TELEGRAM_API_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
