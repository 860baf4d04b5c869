//! S3操作モジュール
//!
//! マスタリングで使う音声ファイルの取得・アップロードを提供する。
//! - オブジェクトの存在確認（HeadObject）
//! - ローカルファイルへのダウンロード
//! - ローカルファイルのアップロード
//! - オブジェクトが現れるまでの待機

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::{info, warn};

use super::config::WaitPolicy;

/// アップロードするWAVのContent-Type
const WAV_CONTENT_TYPE: &str = "audio/wav";

/// S3操作のエラー型
#[derive(Debug, Error)]
pub enum StorageOpsError {
    /// AWS SDK エラー
    #[error("AWS S3 API error: {0}")]
    AwsSdkError(String),
    /// ローカルファイルI/Oエラー
    #[error("Local file error: {0}")]
    IoError(#[from] std::io::Error),
}

/// S3操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait StorageOps: Send + Sync {
    /// オブジェクトが存在するか確認する
    ///
    /// # 戻り値
    /// * `Ok(true)` - 存在する
    /// * `Ok(false)` - 存在しない（404）
    /// * `Err(StorageOpsError)` - 404以外のエラー
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageOpsError>;

    /// オブジェクトをローカルファイルにダウンロードする
    async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<(), StorageOpsError>;

    /// ローカルファイルをアップロードする
    async fn upload_file(&self, path: &Path, bucket: &str, key: &str)
    -> Result<(), StorageOpsError>;
}

/// オブジェクトが現れるまで待機する
///
/// `policy.max_attempts()`回まで確認し、その間`policy.interval`ずつ待つ。
///
/// # 戻り値
/// * `Ok(true)` - オブジェクトが存在する
/// * `Ok(false)` - 待機時間内に現れなかった
/// * `Err(StorageOpsError)` - 404以外のエラー（待機を打ち切る）
pub async fn wait_for_object<S: StorageOps + ?Sized>(
    ops: &S,
    bucket: &str,
    key: &str,
    policy: &WaitPolicy,
) -> Result<bool, StorageOpsError> {
    let attempts = policy.max_attempts();

    for attempt in 1..=attempts {
        if ops.object_exists(bucket, key).await? {
            info!(bucket = %bucket, key = %key, attempt = attempt, "S3オブジェクトを確認");
            return Ok(true);
        }

        if attempt < attempts {
            info!(bucket = %bucket, key = %key, attempt = attempt, "S3オブジェクト待機中");
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(
        bucket = %bucket,
        key = %key,
        timeout_secs = policy.timeout.as_secs(),
        "S3オブジェクトが待機時間内に現れませんでした"
    );
    Ok(false)
}

/// 実際のAWS S3 SDKを使用したS3操作実装
#[derive(Clone)]
pub struct AwsStorageOps {
    client: S3Client,
}

impl AwsStorageOps {
    /// 新しいAwsStorageOpsを作成
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// AWS設定からクライアントを作成
    ///
    /// リージョンが指定されていればそれを使い、なければSDKのデフォルト解決に任せる。
    pub async fn from_config(region_name: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region_name {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self::new(S3Client::new(&config))
    }
}

#[async_trait]
impl StorageOps for AwsStorageOps {
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageOpsError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_not_found())
                {
                    return Ok(false);
                }
                warn!(bucket = %bucket, key = %key, error = %err, "S3 HeadObjectエラー");
                Err(StorageOpsError::AwsSdkError(err.to_string()))
            }
        }
    }

    async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<(), StorageOpsError> {
        info!(bucket = %bucket, key = %key, path = %path.display(), "S3ダウンロード開始");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                warn!(key = %key, error = %err, "S3 GetObjectエラー");
                StorageOpsError::AwsSdkError(err.to_string())
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|err| StorageOpsError::AwsSdkError(err.to_string()))?
            .into_bytes();

        tokio::fs::write(path, &body).await?;

        info!(key = %key, bytes = body.len(), path = %path.display(), "S3ダウンロード完了");
        Ok(())
    }

    async fn upload_file(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageOpsError> {
        info!(path = %path.display(), bucket = %bucket, key = %key, "S3アップロード開始");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| StorageOpsError::AwsSdkError(err.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(WAV_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                warn!(key = %key, error = %err, "S3 PutObjectエラー");
                StorageOpsError::AwsSdkError(err.to_string())
            })?;

        info!(bucket = %bucket, key = %key, "S3アップロード完了");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 指定回数目の確認で存在するようになるモック
    struct AppearingStorage {
        appears_on: usize,
        calls: AtomicUsize,
        keys: Mutex<Vec<String>>,
    }

    impl AppearingStorage {
        fn new(appears_on: usize) -> Self {
            Self {
                appears_on,
                calls: AtomicUsize::new(0),
                keys: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageOps for AppearingStorage {
        async fn object_exists(&self, _bucket: &str, key: &str) -> Result<bool, StorageOpsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.keys.lock().unwrap().push(key.to_string());
            Ok(call >= self.appears_on)
        }

        async fn download_to_file(
            &self,
            _bucket: &str,
            _key: &str,
            _path: &Path,
        ) -> Result<(), StorageOpsError> {
            Ok(())
        }

        async fn upload_file(
            &self,
            _path: &Path,
            _bucket: &str,
            _key: &str,
        ) -> Result<(), StorageOpsError> {
            Ok(())
        }
    }

    /// 常にエラーを返すモック
    struct FailingStorage;

    #[async_trait]
    impl StorageOps for FailingStorage {
        async fn object_exists(&self, _bucket: &str, _key: &str) -> Result<bool, StorageOpsError> {
            Err(StorageOpsError::AwsSdkError("AccessDenied".to_string()))
        }

        async fn download_to_file(
            &self,
            _bucket: &str,
            _key: &str,
            _path: &Path,
        ) -> Result<(), StorageOpsError> {
            unreachable!()
        }

        async fn upload_file(
            &self,
            _path: &Path,
            _bucket: &str,
            _key: &str,
        ) -> Result<(), StorageOpsError> {
            unreachable!()
        }
    }

    fn fast_policy(timeout_ms: u64, interval_ms: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_present() {
        let storage = AppearingStorage::new(1);

        let found = wait_for_object(&storage, "b", "k", &fast_policy(10, 5))
            .await
            .unwrap();

        assert!(found);
        assert_eq!(storage.calls(), 1);
    }

    #[tokio::test]
    async fn test_wait_polls_until_object_appears() {
        let storage = AppearingStorage::new(3);

        let found = wait_for_object(&storage, "b", "static/audio/reference.wav", &fast_policy(20, 5))
            .await
            .unwrap();

        assert!(found);
        assert_eq!(storage.calls(), 3);
        assert!(
            storage
                .keys
                .lock()
                .unwrap()
                .iter()
                .all(|k| k == "static/audio/reference.wav")
        );
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_max_attempts() {
        let storage = AppearingStorage::new(usize::MAX);

        // 10ms / 5ms → 2回
        let found = wait_for_object(&storage, "b", "k", &fast_policy(10, 5))
            .await
            .unwrap();

        assert!(!found);
        assert_eq!(storage.calls(), 2);
    }

    #[tokio::test]
    async fn test_wait_propagates_non_404_errors() {
        let result = wait_for_object(&FailingStorage, "b", "k", &fast_policy(10, 5)).await;

        assert!(matches!(result, Err(StorageOpsError::AwsSdkError(_))));
    }

    #[test]
    fn test_error_display() {
        let err = StorageOpsError::AwsSdkError("boom".to_string());
        assert_eq!(err.to_string(), "AWS S3 API error: boom");

        let err = StorageOpsError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(err.to_string().contains("missing"));
    }
}
