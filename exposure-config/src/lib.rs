use std::path::PathBuf;

use envconfig::Envconfig;
use lazy_static::lazy_static;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Envconfig)]
pub struct Config {
    /// Root of the asset schedule data folder. Snapshots live under `<data_dir>/<env>/`.
    #[envconfig(from = "EXPOSURE_DATA_DIR", default = "./data/AssetScheduleDataFolder")]
    pub data_dir: PathBuf,
    #[envconfig(from = "EXPOSURE_ENV", default = "prod")]
    pub env: String,
    #[envconfig(from = "EXPOSURE_LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }

    /// Directory holding the bin files of one `(audit_id, schedule_id)` snapshot.
    pub fn snapshot_dir(&self, audit_id: i64, schedule_id: i64) -> PathBuf {
        self.data_dir
            .join(self.env.to_lowercase())
            .join(format!("{}_{}", audit_id, schedule_id))
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set, otherwise `EXPOSURE_LOG_LEVEL` is used for the
/// exposure crates. Calling this more than once is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = CONFIG.log_level.to_lowercase();
        format!(
            "exposure_bin_format={level},exposure_tables={level},exposure_config={level}"
        )
        .into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config.env, "prod");
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.data_dir,
            PathBuf::from("./data/AssetScheduleDataFolder")
        );
    }

    #[test]
    fn snapshot_dir_uses_lowercase_env_and_ids() {
        let vars = HashMap::from([
            ("EXPOSURE_DATA_DIR".to_string(), "/srv/exposure".to_string()),
            ("EXPOSURE_ENV".to_string(), "Integration".to_string()),
        ]);
        let config = Config::init_from_hashmap(&vars).unwrap();

        assert_eq!(
            config.snapshot_dir(1234, 0),
            PathBuf::from("/srv/exposure/integration/1234_0")
        );
    }

    #[test]
    fn tracing_can_be_initialised_twice() {
        init_tracing();
        init_tracing();
        tracing::debug!("tracing initialised");
    }
}
