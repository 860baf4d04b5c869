/// Lambda関数の実行設定
///
/// 環境変数名はデプロイ済み関数の設定をそのまま引き継いでいる（小文字）。
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// S3バケット名
pub const BUCKET_NAME_VAR: &str = "bucket_name";
/// S3リージョン（任意）
pub const REGION_NAME_VAR: &str = "region_name";
/// 進捗通知先Webhook URL
pub const WEBHOOK_URL_VAR: &str = "webhook_url";
/// S3オブジェクト待機のタイムアウト秒数（任意）
pub const WAIT_TIMEOUT_VAR: &str = "s3_wait_timeout_secs";
/// S3オブジェクト待機のポーリング間隔秒数（任意）
pub const WAIT_INTERVAL_VAR: &str = "s3_wait_interval_secs";
/// 一時ファイルの作業ディレクトリ（任意）
pub const WORK_DIR_VAR: &str = "work_dir";

const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WAIT_INTERVAL_SECS: u64 = 5;
const DEFAULT_WORK_DIR: &str = "/tmp";

/// 設定のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// S3オブジェクトの出現を待つポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// 確認を行う最大回数
    ///
    /// `ceil(timeout / interval)`回（最低1回）。デフォルトの10秒/5秒なら2回。
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let timeout = self.timeout.as_nanos();
        let interval = self.interval.as_nanos();
        u32::try_from(timeout.div_ceil(interval)).unwrap_or(u32::MAX).max(1)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_WAIT_INTERVAL_SECS),
        }
    }
}

/// サービス設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    bucket_name: String,
    region_name: Option<String>,
    webhook_url: Url,
    wait: WaitPolicy,
    work_dir: PathBuf,
}

impl ServiceConfig {
    /// 値を指定して作成（テスト用）
    #[cfg(test)]
    pub fn new(bucket_name: impl Into<String>, webhook_url: Url) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region_name: None,
            webhook_url,
            wait: WaitPolicy::default(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
        }
    }

    /// 環境変数から設定を読み込み
    ///
    /// # 環境変数
    /// - `bucket_name`: S3バケット名（必須）
    /// - `webhook_url`: 進捗通知先URL（必須）
    /// - `region_name`: S3リージョン（任意、未設定ならSDKのデフォルト解決）
    /// - `s3_wait_timeout_secs`: 待機タイムアウト（任意、デフォルト10）
    /// - `s3_wait_interval_secs`: ポーリング間隔（任意、デフォルト5、0は不可）
    /// - `work_dir`: 作業ディレクトリ（任意、デフォルト/tmp）
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込み
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bucket_name = required(BUCKET_NAME_VAR)?;

        let raw_url = required(WEBHOOK_URL_VAR)?;
        let webhook_url = Url::parse(&raw_url).map_err(|_| ConfigError::InvalidValue {
            name: WEBHOOK_URL_VAR.to_string(),
            value: raw_url.clone(),
        })?;

        let timeout = parse_secs(WAIT_TIMEOUT_VAR, optional(WAIT_TIMEOUT_VAR))?
            .unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS);
        let interval = parse_secs(WAIT_INTERVAL_VAR, optional(WAIT_INTERVAL_VAR))?
            .unwrap_or(DEFAULT_WAIT_INTERVAL_SECS);
        if interval == 0 {
            return Err(ConfigError::InvalidValue {
                name: WAIT_INTERVAL_VAR.to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bucket_name,
            region_name: optional(REGION_NAME_VAR),
            webhook_url,
            wait: WaitPolicy::new(Duration::from_secs(timeout), Duration::from_secs(interval)),
            work_dir: optional(WORK_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
        })
    }

    #[cfg(test)]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region_name.as_deref()
    }

    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    pub fn wait(&self) -> WaitPolicy {
        self.wait
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

fn parse_secs(name: &str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: v.clone(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_with_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "songs-bucket"),
            ("webhook_url", "https://api.example.com/hooks/status"),
        ]))
        .unwrap();

        assert_eq!(config.bucket_name(), "songs-bucket");
        assert_eq!(
            config.webhook_url().as_str(),
            "https://api.example.com/hooks/status"
        );
        assert_eq!(config.region_name(), None);
        assert_eq!(config.wait(), WaitPolicy::default());
        assert_eq!(config.work_dir(), Path::new("/tmp"));
    }

    #[test]
    fn test_from_lookup_with_all_values() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "b"),
            ("webhook_url", "http://localhost:8080/hook"),
            ("region_name", "us-east-2"),
            ("s3_wait_timeout_secs", "30"),
            ("s3_wait_interval_secs", "2"),
            ("work_dir", "/var/task/tmp"),
        ]))
        .unwrap();

        assert_eq!(config.region_name(), Some("us-east-2"));
        assert_eq!(config.wait().timeout, Duration::from_secs(30));
        assert_eq!(config.wait().interval, Duration::from_secs(2));
        assert_eq!(config.work_dir(), Path::new("/var/task/tmp"));
    }

    #[test]
    fn test_missing_bucket() {
        let result =
            ServiceConfig::from_lookup(lookup_from(&[("webhook_url", "https://example.com")]));
        assert_eq!(
            result,
            Err(ConfigError::MissingEnvVar("bucket_name".to_string()))
        );
    }

    #[test]
    fn test_empty_webhook_is_missing() {
        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "b"),
            ("webhook_url", ""),
        ]));
        assert_eq!(
            result,
            Err(ConfigError::MissingEnvVar("webhook_url".to_string()))
        );
    }

    #[test]
    fn test_invalid_values() {
        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "b"),
            ("webhook_url", "not a url"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref name, .. }) if name == "webhook_url"));

        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "b"),
            ("webhook_url", "https://example.com"),
            ("s3_wait_timeout_secs", "ten"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref name, .. }) if name == "s3_wait_timeout_secs"));

        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("bucket_name", "b"),
            ("webhook_url", "https://example.com"),
            ("s3_wait_interval_secs", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref name, .. }) if name == "s3_wait_interval_secs"));
    }

    #[test]
    fn test_wait_policy_attempts() {
        assert_eq!(WaitPolicy::default().max_attempts(), 2);
        assert_eq!(
            WaitPolicy::new(Duration::from_secs(11), Duration::from_secs(5)).max_attempts(),
            3
        );
        assert_eq!(
            WaitPolicy::new(Duration::ZERO, Duration::from_secs(5)).max_attempts(),
            1
        );
        assert_eq!(
            WaitPolicy::new(Duration::from_secs(5), Duration::ZERO).max_attempts(),
            1
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ConfigError::MissingEnvVar("bucket_name".to_string()).to_string(),
            "Missing environment variable: bucket_name"
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // 環境変数を設定 (Rust 2024ではunsafe)
        unsafe {
            std::env::set_var(BUCKET_NAME_VAR, "env-bucket");
            std::env::set_var(WEBHOOK_URL_VAR, "https://hooks.example.com/x");
            std::env::remove_var(REGION_NAME_VAR);
        }

        let config = ServiceConfig::from_env().expect("設定の読み込みに失敗");
        assert_eq!(config.bucket_name(), "env-bucket");
        assert_eq!(config.webhook_url().host_str(), Some("hooks.example.com"));

        // クリーンアップ
        unsafe {
            std::env::remove_var(BUCKET_NAME_VAR);
            std::env::remove_var(WEBHOOK_URL_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_missing() {
        unsafe {
            std::env::remove_var(BUCKET_NAME_VAR);
            std::env::remove_var(WEBHOOK_URL_VAR);
        }

        assert_eq!(
            ServiceConfig::from_env(),
            Err(ConfigError::MissingEnvVar("bucket_name".to_string()))
        );
    }
}
