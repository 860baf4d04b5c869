/// マスタリングジョブハンドラー
///
/// SQSイベントの各レコードを1件のマスタリングジョブとして処理する。
///
/// # 処理フロー（1レコード）
/// 1. メッセージ本文をジョブとしてパース
/// 2. 開始通知
/// 3. リファレンス・伴奏・ボーカルをS3で待機してダウンロード
/// 4. ミックスとマスタリング（ブロッキングスレッドで実行）
/// 5. 結果をS3にアップロードして完了通知
///
/// どの段階で失敗してもエラー通知を送り、一時ファイルは必ず削除する。
/// 1レコードの失敗で残りのレコードの処理は止めない。
use std::path::{Path, PathBuf};

use aws_lambda_events::event::sqs::SqsEvent;
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::audio::{self, AudioError, MasteringConfig, WavFormat};
use crate::domain::{JobError, MasteringJob, SongId, StatusNotification};
use crate::infrastructure::{
    ScratchFiles, ServiceConfig, StatusNotifier, StorageOps, StorageOpsError, WaitPolicy,
    wait_for_object,
};

/// リファレンス音源のS3キー
pub const REFERENCE_KEY: &str = "static/audio/reference.wav";

/// ジョブ処理のエラー型
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Storage(#[from] StorageOpsError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    /// 待機時間内にS3オブジェクトが現れなかった
    #[error("{0}")]
    ObjectUnavailable(String),

    /// ブロッキングタスクの失敗（パニック等）
    #[error("Audio processing task failed: {0}")]
    Task(String),
}

/// バッチ処理結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub success_count: usize,
    pub failure_count: usize,
}

/// パイプラインの設定
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bucket: String,
    pub reference_key: String,
    pub wait: WaitPolicy,
    pub work_dir: PathBuf,
    pub mastering: MasteringConfig,
}

impl PipelineSettings {
    /// サービス設定から作成（マスタリング設定はデフォルト）
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            bucket: config.bucket_name().to_string(),
            reference_key: REFERENCE_KEY.to_string(),
            wait: config.wait(),
            work_dir: config.work_dir().to_path_buf(),
            mastering: MasteringConfig::default(),
        }
    }
}

/// マスタリングジョブを処理するハンドラー
pub struct MasteringHandler<S, N>
where
    S: StorageOps,
    N: StatusNotifier,
{
    storage: S,
    notifier: N,
    settings: PipelineSettings,
}

impl<S, N> MasteringHandler<S, N>
where
    S: StorageOps,
    N: StatusNotifier,
{
    pub fn new(storage: S, notifier: N, settings: PipelineSettings) -> Self {
        Self {
            storage,
            notifier,
            settings,
        }
    }

    /// SQSイベントを処理する
    ///
    /// ジョブの失敗はWebhookで通知済みのため、戻り値は件数の集計のみ。
    pub async fn handle_event(&self, event: SqsEvent) -> BatchResult {
        let mut result = BatchResult::default();

        info!(record_count = event.records.len(), "SQSイベント処理開始");

        for record in event.records {
            let message_id = record.message_id.unwrap_or_default();
            let body = record.body.unwrap_or_default();

            match self.handle_message(&body).await {
                Ok(()) => result.success_count += 1,
                Err(err) => {
                    warn!(message_id = %message_id, error = %err, "レコード処理に失敗");
                    result.failure_count += 1;
                }
            }
        }

        info!(
            success_count = result.success_count,
            failure_count = result.failure_count,
            "SQSイベント処理完了"
        );

        result
    }

    /// メッセージ本文1件を処理する
    pub async fn handle_message(&self, body: &str) -> Result<(), PipelineError> {
        let job = match MasteringJob::from_body(body) {
            Ok(job) => job,
            Err(err) => {
                let song_id = SongId::from_body_lenient(body);
                error!(song_id = %song_id, error = %err, "ジョブのパースに失敗");
                self.notify(StatusNotification::error(song_id, err.to_string()))
                    .await;
                return Err(err.into());
            }
        };

        let span = info_span!(
            "job",
            song_id = %job.song_id(),
            track_id = %job.track_id(),
            file_name = job.file_name()
        );
        self.process_job(&job).instrument(span).await
    }

    async fn process_job(&self, job: &MasteringJob) -> Result<(), PipelineError> {
        let files = ScratchFiles::for_job(&self.settings.work_dir, job);

        let result = self.run_job(job, &files).await;
        files.cleanup().await;

        match &result {
            Ok(()) => info!(output_key = %job.output_key(), "マスタリングジョブ完了"),
            Err(err) => {
                error!(error = %err, "マスタリングジョブ失敗");
                self.notify(StatusNotification::error(job.song_id().clone(), err.to_string()))
                    .await;
            }
        }

        result
    }

    async fn run_job(&self, job: &MasteringJob, files: &ScratchFiles) -> Result<(), PipelineError> {
        self.notify(StatusNotification::start(job.song_id().clone()))
            .await;

        self.fetch(
            &self.settings.reference_key,
            files.reference(),
            "Reference file not available within timeout".to_string(),
        )
        .await?;

        self.fetch(
            &job.instrumental_key(),
            files.instrumental(),
            "Instrumental file not available within timeout".to_string(),
        )
        .await?;

        let vocals_key = job.vocals_key();
        self.fetch(
            &vocals_key,
            files.vocals(),
            format!("Vocals file not available: {}", vocals_key),
        )
        .await?;

        let task_files = files.clone();
        let config = self.settings.mastering.clone();
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                render_master(
                    task_files.vocals(),
                    task_files.instrumental(),
                    task_files.reference(),
                    task_files.output(),
                    &config,
                )
            })
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        self.storage
            .upload_file(files.output(), &self.settings.bucket, &job.output_key())
            .await?;

        self.notify(StatusNotification::end(
            job.song_id().clone(),
            job.output_file_name(),
        ))
        .await;

        Ok(())
    }

    /// S3オブジェクトを待機してダウンロードする
    async fn fetch(
        &self,
        key: &str,
        path: &Path,
        unavailable_message: String,
    ) -> Result<(), PipelineError> {
        let bucket = &self.settings.bucket;

        if !wait_for_object(&self.storage, bucket, key, &self.settings.wait).await? {
            return Err(PipelineError::ObjectUnavailable(unavailable_message));
        }

        self.storage.download_to_file(bucket, key, path).await?;
        Ok(())
    }

    /// 通知を送る（失敗はログのみ）
    async fn notify(&self, notification: StatusNotification) {
        if let Err(err) = self.notifier.notify(&notification).await {
            error!(
                action = ?notification.action,
                error = %err,
                "Webhook通知に失敗"
            );
        }
    }
}

/// ボーカルと伴奏をミックスし、リファレンスに合わせてマスタリングした結果を
/// 24bit PCMのWAVとして書き出す
pub fn render_master(
    vocals_path: &Path,
    instrumental_path: &Path,
    reference_path: &Path,
    output_path: &Path,
    config: &MasteringConfig,
) -> Result<(), AudioError> {
    info!(
        vocals = %vocals_path.display(),
        instrumental = %instrumental_path.display(),
        reference = %reference_path.display(),
        output = %output_path.display(),
        "ミックス・マスタリング開始"
    );

    let vocals = audio::read_wav(vocals_path)?;
    let instrumental = audio::read_wav(instrumental_path)?;
    let reference = audio::read_wav(reference_path)?;

    let mixed = audio::mix_tracks(&vocals, &instrumental)?;
    let mastered = audio::master(&mixed, &reference, config)?;
    audio::write_wav(output_path, &mastered, WavFormat::Pcm24)?;

    info!(output = %output_path.display(), "マスタリング結果を書き出し");
    Ok(())
}
