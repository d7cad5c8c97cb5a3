//! Typed configuration assembled from environment variables (§6.3) plus
//! constructor arguments the CLI boundary supplies explicitly. There is no
//! config-file parsing here: loading a file and handing us the values is
//! the external collaborator's job.

pub mod constants;

use std::time::Duration;

use url::Url;

use crate::checksum::Algorithm;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: Url,
    pub persistent_id: String,
    pub parallelism: usize,
    pub checksum_algo: Algorithm,
    pub force_native: bool,
    pub replace_existing: bool,
    pub retry: RetryPolicy,
    pub max_package_size: u64,
    pub lock_wait_interval: Duration,
    pub lock_timeout: Duration,
}

impl Config {
    /// Builds configuration from the caller-supplied credentials/dataset
    /// identity and the §6.3 tunables, applying their documented defaults
    /// where an environment variable is absent.
    pub fn from_env(api_key: String, base_url: Url, persistent_id: String) -> Result<Self> {
        let retry = RetryPolicy {
            max_retries: parse_env(
                constants::ENV_MAX_RETRIES,
                constants::DEFAULT_MAX_RETRIES,
            )?,
            min_retry_time: Duration::from_secs(parse_env(
                constants::ENV_MIN_RETRY_TIME,
                constants::DEFAULT_MIN_RETRY_TIME_SECS,
            )?),
            max_retry_time: Duration::from_secs(parse_env(
                constants::ENV_MAX_RETRY_TIME,
                constants::DEFAULT_MAX_RETRY_TIME_SECS,
            )?),
            multiplier: parse_env(
                constants::ENV_RETRY_MULTIPLIER,
                constants::DEFAULT_RETRY_MULTIPLIER,
            )?,
        };

        Ok(Config {
            api_key,
            base_url,
            persistent_id,
            parallelism: parse_env(constants::ENV_PARALLELISM, constants::DEFAULT_PARALLELISM)?,
            checksum_algo: Algorithm::Md5,
            force_native: false,
            replace_existing: false,
            retry,
            max_package_size: parse_env(
                constants::ENV_MAX_PKG_SIZE,
                constants::DEFAULT_MAX_PKG_SIZE,
            )?,
            lock_wait_interval: Duration::from_secs(parse_env(
                constants::ENV_LOCK_WAIT_TIME,
                constants::DEFAULT_LOCK_WAIT_TIME_SECS,
            )?),
            lock_timeout: Duration::from_secs(parse_env(
                constants::ENV_LOCK_TIMEOUT,
                constants::DEFAULT_LOCK_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::configuration(format!("{name}={raw:?} is not a valid value"))),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(Error::configuration(format!("{name} is not valid UTF-8")))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_env_falls_back_to_documented_defaults() {
        std::env::remove_var(constants::ENV_MAX_RETRIES);
        std::env::remove_var(constants::ENV_MAX_PKG_SIZE);

        let config = Config::from_env(
            "key".to_string(),
            Url::parse("https://dataverse.example").unwrap(),
            "doi:10/ABC".to_string(),
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, constants::DEFAULT_MAX_RETRIES);
        assert_eq!(config.max_package_size, constants::DEFAULT_MAX_PKG_SIZE);
    }

    #[test]
    fn from_env_rejects_unparsable_value() {
        std::env::set_var(constants::ENV_MAX_RETRIES, "not-a-number");
        let result = Config::from_env(
            "key".to_string(),
            Url::parse("https://dataverse.example").unwrap(),
            "doi:10/ABC".to_string(),
        );
        std::env::remove_var(constants::ENV_MAX_RETRIES);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
