//! Names and defaults of the tunable environment (§6.3).

pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";
pub const ENV_MAX_RETRY_TIME: &str = "MAX_RETRY_TIME";
pub const ENV_MIN_RETRY_TIME: &str = "MIN_RETRY_TIME";
pub const ENV_RETRY_MULTIPLIER: &str = "RETRY_MULTIPLIER";
pub const ENV_MAX_PKG_SIZE: &str = "MAX_PKG_SIZE";
pub const ENV_LOCK_WAIT_TIME: &str = "LOCK_WAIT_TIME";
pub const ENV_LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
pub const ENV_MAX_FILE_DISPLAY: &str = "MAX_FILE_DISPLAY";
pub const ENV_PARALLELISM: &str = "DVUPLOADER_PARALLELISM";

pub const DEFAULT_MAX_RETRIES: u32 = 15;
pub const DEFAULT_MAX_RETRY_TIME_SECS: u64 = 10;
pub const DEFAULT_MIN_RETRY_TIME_SECS: u64 = 1;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_PKG_SIZE: u64 = 2 * (1u64 << 30);
pub const DEFAULT_LOCK_WAIT_TIME_SECS: u64 = 5;
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_FILE_DISPLAY: usize = 50;
pub const DEFAULT_PARALLELISM: usize = 4;
