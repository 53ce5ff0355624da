// -
// Log files

/// Appended to a document name to form its log file name
pub(crate) const DEFAULT_LOG_FILE_SUFFIX: &str = ".json.log";

/// How many times the cache re-resolves a store that closed under a caller
pub(crate) const MAX_REOPEN_ATTEMPTS: usize = 3;

// -
// Metric labels

pub(crate) const EVICT_REASON_SLOW_CONSUMER: &str = "slow_consumer";
pub(crate) const EVICT_REASON_CATCHUP_OVERFLOW: &str = "catchup_overflow";
pub(crate) const EVICT_REASON_TAIL_IDLE: &str = "tail_idle";
