use std::path::PathBuf;

use porteiro_core::Metric;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Path to the shared signal file read by the indicator.
    pub channel_path: PathBuf,
    /// Maximum signature distance for a positive match.
    pub tolerance: f64,
    /// Distance metric for the matcher.
    pub metric: Metric,
    /// Debounce window: minimum seconds between two fresh grants.
    pub debounce_secs: u64,
    /// Pause between frames in access mode, in milliseconds.
    pub frame_interval_ms: u64,
}

impl Config {
    /// Load configuration from `PORTEIRO_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("porteiro");

        let model_dir = std::env::var("PORTEIRO_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let db_path = std::env::var("PORTEIRO_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("condominio.db"));

        let channel_path = std::env::var("PORTEIRO_CHANNEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("comando.txt"));

        let metric = match std::env::var("PORTEIRO_METRIC").as_deref() {
            Ok("cosine") => Metric::Cosine,
            _ => Metric::Euclidean,
        };

        Self {
            camera_device: std::env::var("PORTEIRO_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            db_path,
            channel_path,
            tolerance: env_f64("PORTEIRO_TOLERANCE", 0.6),
            metric,
            debounce_secs: env_u64("PORTEIRO_DEBOUNCE_SECS", 3),
            frame_interval_ms: env_u64("PORTEIRO_FRAME_INTERVAL_MS", 100),
        }
    }

    /// Path to the face detection model.
    pub fn detect_model_path(&self) -> String {
        self.model_dir
            .join("face-detect.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the signature embedding model.
    pub fn encode_model_path(&self) -> String {
        self.model_dir
            .join("face-encode.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
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
