use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::constants::DEFAULT_LOG_FILE_SUFFIX;
use crate::Error;
use crate::Result;

/// Location and naming of log files. A document named `n` is stored in
/// `<data_dir>/n<log_file_suffix>`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_file_suffix")]
    pub log_file_suffix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file_suffix: default_log_file_suffix(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        validate_directory(&self.data_dir, "data_dir")?;

        if self.log_file_suffix.contains('/') || self.log_file_suffix.contains('\\') {
            return Err(Error::Config(ConfigError::Message(format!(
                "log_file_suffix {:?} must not contain path separators",
                self.log_file_suffix
            ))));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_log_file_suffix() -> String {
    DEFAULT_LOG_FILE_SUFFIX.to_string()
}
