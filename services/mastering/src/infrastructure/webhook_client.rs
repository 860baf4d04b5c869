// WebhookClient - 進捗通知用HTTPクライアント
//
// マスタリングの開始・完了・エラーを上流システムのWebhookにPOSTする。
// 通知の失敗はジョブの失敗にはしない（呼び出し側でログに残すだけ）。

use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::domain::StatusNotification;

/// 最大再試行回数
const MAX_RETRIES: u32 = 3;

/// リクエストタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 接続タイムアウト（秒）
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 通知のエラー型
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTPエラー（ステータスコード付き）
    #[error("Webhook HTTP error: status={status}, message={message}")]
    HttpError { status: u16, message: String },

    /// ネットワークエラー
    #[error("Webhook network error: {0}")]
    NetworkError(String),

    /// シリアライズエラー
    #[error("Webhook payload serialization error: {0}")]
    SerializationError(String),

    /// クライアント構築エラー
    #[error("Webhook client build error: {0}")]
    BuildError(String),
}

/// 進捗通知トレイト（テスト用の抽象化）
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// 通知を送る
    async fn notify(&self, notification: &StatusNotification) -> Result<(), NotifyError>;
}

/// Webhookクライアント
///
/// 指数バックオフによる再試行機能を持つ。
#[derive(Clone)]
pub struct WebhookClient {
    client: ClientWithMiddleware,
    url: Url,
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl WebhookClient {
    /// WebhookClientを作成
    pub fn new(url: Url) -> Result<Self, NotifyError> {
        Self::with_max_retries(url, MAX_RETRIES)
    }

    /// 再試行回数を指定してWebhookClientを作成
    pub fn with_max_retries(url: Url, max_retries: u32) -> Result<Self, NotifyError> {
        info!(url = %url, "WebhookClientを初期化");

        let base_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotifyError::BuildError(e.to_string()))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, url })
    }
}

#[async_trait]
impl StatusNotifier for WebhookClient {
    #[instrument(skip(self, notification), fields(song_id = %notification.song_id, action = ?notification.action))]
    async fn notify(&self, notification: &StatusNotification) -> Result<(), NotifyError> {
        let body = serde_json::to_string(notification)
            .map_err(|e| NotifyError::SerializationError(e.to_string()))?;
        debug!(body = %body, "Webhook通知を送信");

        let response = self
            .client
            .post(self.url.as_str())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Webhook通知リクエスト失敗");
                NotifyError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            info!(status = %status, "Webhook通知成功");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        error!(status = %status, body = %message, "Webhook通知エラー");

        Err(NotifyError::HttpError {
            status: status.as_u16(),
            message,
        })
    }
}
