/// マスタリング Lambda関数
///
/// SQSメッセージ1件ごとに、合成ボーカルと伴奏トラックをミックスし、
/// リファレンス音源に合わせてマスタリングした結果をS3にアップロードする。
/// 進捗（start/end/error）はWebhookで上流システムに通知する。
///
/// S3クライアントとWebhookクライアントはコールドスタート時に1回だけ作成する。
use aws_lambda_events::event::sqs::SqsEvent;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use mastering::application::{MasteringHandler, PipelineSettings};
use mastering::infrastructure::{AwsStorageOps, ServiceConfig, WebhookClient, init_logging};
use tracing::{error, info};

type Handler = MasteringHandler<AwsStorageOps, WebhookClient>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "設定読み込み失敗");
            return Err(err.into());
        }
    };

    info!(
        bucket = config.bucket_name(),
        region = ?config.region_name(),
        webhook_url = %config.webhook_url(),
        wait_timeout_secs = config.wait().timeout.as_secs(),
        wait_interval_secs = config.wait().interval.as_secs(),
        work_dir = %config.work_dir().display(),
        "設定を読み込み"
    );

    let storage = AwsStorageOps::from_config(config.region_name()).await;
    let notifier = WebhookClient::new(config.webhook_url().clone())?;
    let handler = MasteringHandler::new(storage, notifier, PipelineSettings::from_config(&config));

    // Lambda関数を初期化して実行
    let handler_ref = &handler;
    let func = service_fn(move |event: LambdaEvent<SqsEvent>| async move {
        lambda_handler(handler_ref, event).await
    });
    lambda_runtime::run(func).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// ジョブの失敗はWebhookで通知済みのため、SQSの再配信は行わず常にOkを返す。
async fn lambda_handler(handler: &Handler, event: LambdaEvent<SqsEvent>) -> Result<(), Error> {
    let request_id = event.context.request_id.clone();
    info!(request_id = %request_id, "SQSイベントを受信");

    let result = handler.handle_event(event.payload).await;

    info!(
        request_id = %request_id,
        success_count = result.success_count,
        failure_count = result.failure_count,
        "マスタリング処理完了"
    );

    Ok(())
}
