/// Configuration management for recording-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Each component receives only the section it needs.
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub agora: AgoraConfig,
    pub s3: S3Config,
    pub upstream: UpstreamConfig,
    pub reconciliation: ReconciliationConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Vendor credentials and recording defaults
#[derive(Clone, Debug, Deserialize)]
pub struct AgoraConfig {
    pub app_id: String,
    pub customer_id: String,
    pub customer_secret: String,
    pub api_base_url: String,
    pub token_service_url: String,
    /// uid the recorder joins the channel with when the caller gives none
    pub recording_uid: String,
    pub token_ttl_secs: u32,
    pub resource_expired_hours: u32,
    /// e.g. ["hls", "mp4"]
    pub file_types: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    /// Slash-separated key prefix the vendor uploads under
    pub file_prefix: String,
    pub playback_url_ttl_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpstreamConfig {
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReconciliationConfig {
    pub pending_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: env_or("RECORDING_SERVICE_HOST", "0.0.0.0"),
                port: parse_env("RECORDING_SERVICE_PORT", 8090)?,
                env: env_or("APP_ENV", "development"),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/recordings"),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            agora: AgoraConfig {
                app_id: required("AGORA_APP_ID")?,
                customer_id: required("AGORA_CUSTOMER_ID")?,
                customer_secret: required("AGORA_CUSTOMER_SECRET")?,
                api_base_url: env_or("AGORA_API_BASE_URL", "https://api.agora.io"),
                token_service_url: required("AGORA_TOKEN_SERVICE_URL")?,
                recording_uid: env_or("AGORA_RECORDING_UID", "999999"),
                token_ttl_secs: parse_env("AGORA_TOKEN_TTL_SECS", 3600)?,
                resource_expired_hours: parse_env("AGORA_RESOURCE_EXPIRED_HOURS", 24)?,
                file_types: env_or("AGORA_RECORDING_FILE_TYPES", "hls,mp4")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            s3: S3Config {
                bucket: required("S3_BUCKET")?,
                region: env_or("AWS_REGION", "us-east-1"),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                file_prefix: env_or("RECORDING_FILE_PREFIX", "recordings"),
                playback_url_ttl_secs: parse_env("PLAYBACK_URL_TTL_SECS", 7200)?,
            },
            upstream: UpstreamConfig {
                timeout_ms: parse_env("UPSTREAM_TIMEOUT_MS", 10_000)?,
            },
            reconciliation: ReconciliationConfig {
                pending_ttl_secs: parse_env("PENDING_ACQUISITION_TTL_SECS", 600)?,
                sweep_interval_secs: parse_env("PENDING_SWEEP_INTERVAL_SECS", 60)?,
            },
        })
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl S3Config {
    pub fn playback_url_ttl(&self) -> Duration {
        Duration::from_secs(self.playback_url_ttl_secs)
    }

    /// Prefix segments as the vendor storage config expects them
    pub fn prefix_segments(&self) -> Vec<String> {
        self.file_prefix
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ReconciliationConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Vendor storage region code for an AWS region name.
///
/// Cloud recording addresses S3 regions by integer; unknown regions are
/// rejected at startup rather than at the first start call.
pub fn agora_region_code(aws_region: &str) -> Option<u8> {
    let code = match aws_region {
        "us-east-1" => 0,
        "us-east-2" => 1,
        "us-west-1" => 2,
        "us-west-2" => 3,
        "eu-west-1" => 4,
        "eu-west-2" => 5,
        "eu-west-3" => 6,
        "eu-central-1" => 7,
        "ap-southeast-1" => 8,
        "ap-southeast-2" => 9,
        "ap-northeast-1" => 10,
        "ap-northeast-2" => 11,
        "sa-east-1" => 12,
        "ca-central-1" => 13,
        "ap-south-1" => 14,
        "cn-north-1" => 15,
        "cn-northwest-1" => 16,
        "us-gov-west-1" => 17,
        "ap-east-1" => 18,
        "me-south-1" => 19,
        "eu-north-1" => 22,
        _ => return None,
    };
    Some(code)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config(prefix: &str) -> S3Config {
        S3Config {
            bucket: "recordings-test".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            file_prefix: prefix.to_string(),
            playback_url_ttl_secs: 7200,
        }
    }

    #[test]
    fn test_prefix_segments_trim_slashes() {
        assert_eq!(
            s3_config("recordings/agora/").prefix_segments(),
            vec!["recordings", "agora"]
        );
        assert_eq!(s3_config(" /recordings ").prefix_segments(), vec!["recordings"]);
        assert!(s3_config("").prefix_segments().is_empty());
    }

    #[test]
    fn test_region_codes() {
        assert_eq!(agora_region_code("us-east-1"), Some(0));
        assert_eq!(agora_region_code("ap-northeast-1"), Some(10));
        assert_eq!(agora_region_code("mars-central-1"), None);
    }
}
