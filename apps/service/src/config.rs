use std::{env, fmt, fs, net::SocketAddr, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uppe_core::flap::FlapThresholds;
use uppe_core::{ProcessorConfig, ServiceState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse config {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object definitions file, relative paths are taken from the working directory
    pub objects: path::PathBuf,
    pub engine: Engine,
    pub intake: Intake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    /// Maximum queued results, 0 for unbounded
    pub queue_capacity: usize,
    /// How long the processing loop waits for a result before housekeeping
    pub poll_interval_ms: u64,
    /// Seconds per interval unit
    pub interval_length: u64,
    pub enable_flap_detection: bool,
    pub enable_notifications: bool,
    pub soft_state_dependencies: bool,
    pub low_host_flap_threshold: f64,
    pub high_host_flap_threshold: f64,
    pub low_service_flap_threshold: f64,
    pub high_service_flap_threshold: f64,
    pub service_check_timeout_state: ServiceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Intake {
    /// Read JSON lines from standard input
    pub stdin: bool,
    /// Accept JSON lines from remote workers
    pub listen: Option<SocketAddr>,
    /// Delay before resubmitting a result the queue pushed back
    pub retry_backoff_ms: u64,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            objects: path::PathBuf::from("objects.toml"),
            engine: Engine::default(),
            intake: Intake::default(),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        let processor = ProcessorConfig::default();
        Self {
            queue_capacity: 0,
            poll_interval_ms: 1000,
            interval_length: processor.interval_length,
            enable_flap_detection: processor.enable_flap_detection,
            enable_notifications: processor.enable_notifications,
            soft_state_dependencies: processor.soft_state_dependencies,
            low_host_flap_threshold: processor.host_flap_thresholds.low,
            high_host_flap_threshold: processor.host_flap_thresholds.high,
            low_service_flap_threshold: processor.service_flap_thresholds.low,
            high_service_flap_threshold: processor.service_flap_thresholds.high,
            service_check_timeout_state: processor.service_timeout_state,
        }
    }
}

impl Default for Intake {
    fn default() -> Self {
        Self { stdin: false, listen: None, retry_backoff_ms: 100 }
    }
}

impl Engine {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            interval_length: self.interval_length,
            host_flap_thresholds: FlapThresholds {
                low: self.low_host_flap_threshold,
                high: self.high_host_flap_threshold,
            },
            service_flap_thresholds: FlapThresholds {
                low: self.low_service_flap_threshold,
                high: self.high_service_flap_threshold,
            },
            enable_flap_detection: self.enable_flap_detection,
            enable_notifications: self.enable_notifications,
            soft_state_dependencies: self.soft_state_dependencies,
            service_timeout_state: self.service_check_timeout_state,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Intake {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Objects")?;
        write_1(f, "Definitions", &self.objects.display())?;

        let engine = &self.engine;
        let capacity: &dyn fmt::Display =
            if engine.queue_capacity == 0 { &"unbounded" } else { &engine.queue_capacity };
        write_title_1(f, "Engine")?;
        write_1(f, "Queue Capacity", capacity)?;
        write_1(f, "Poll Interval (ms)", &engine.poll_interval_ms)?;
        write_1(f, "Interval Length (s)", &engine.interval_length)?;
        write_1(f, "Flap Detection", &engine.enable_flap_detection)?;
        write_1(f, "Notifications", &engine.enable_notifications)?;
        write_1(f, "Soft State Dependencies", &engine.soft_state_dependencies)?;
        write_1(
            f,
            "Host Flap Thresholds",
            &format!("{}-{}", engine.low_host_flap_threshold, engine.high_host_flap_threshold),
        )?;
        write_1(
            f,
            "Service Flap Thresholds",
            &format!("{}-{}", engine.low_service_flap_threshold, engine.high_service_flap_threshold),
        )?;
        write_1(f, "Service Timeout State", &engine.service_check_timeout_state)?;

        let listen: &dyn fmt::Display = match &self.intake.listen {
            Some(addr) => addr,
            None => &"disabled",
        };
        write_title_1(f, "Intake")?;
        write_1(f, "Standard Input", &self.intake.stdin)?;
        write_1(f, "Listen Address", listen)?;
        write_1(f, "Retry Backoff (ms)", &self.intake.retry_backoff_ms)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| Error::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
