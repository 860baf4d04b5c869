/// マスタリング処理のローカル実行ツール
///
/// Lambdaにデプロイせずにパイプラインを動かすためのCLI。
///
/// # サブコマンド
/// - `event`: SQSイベントJSONを読み込み、実際のS3・Webhookに対して処理する
/// - `master`: ローカルのWAVファイルだけでミックス・マスタリングする（AWS不要）
///
/// # ローカル実行
/// ```bash
/// export bucket_name=my-bucket
/// export webhook_url=https://example.com/hooks/status
///
/// # SQSイベントファイルで実行
/// cargo run --bin local_invoke -- event --file input.json
///
/// # ファイルだけでマスタリング
/// cargo run --bin local_invoke -- master \
///     --vocals vocals.wav --instrumental inst.wav \
///     --reference reference.wav --output out.wav
/// ```
use std::path::PathBuf;

use aws_lambda_events::event::sqs::SqsEvent;
use clap::{Parser, Subcommand};
use lambda_runtime::Error;
use mastering::application::{MasteringHandler, PipelineSettings, render_master};
use mastering::audio::MasteringConfig;
use mastering::infrastructure::{AwsStorageOps, ServiceConfig, WebhookClient, init_local_logging};
use tracing::{error, info};

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "local_invoke")]
#[command(about = "マスタリングパイプラインをローカルで実行")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SQSイベントJSONファイルでパイプライン全体を実行
    Event {
        /// SQSイベントのJSONファイル
        #[arg(long, short = 'f', default_value = "input.json")]
        file: PathBuf,
    },

    /// ローカルファイルだけでミックス・マスタリングを実行
    Master {
        /// 合成ボーカルのWAV
        #[arg(long)]
        vocals: PathBuf,
        /// 伴奏トラックのWAV
        #[arg(long)]
        instrumental: PathBuf,
        /// リファレンス音源のWAV
        #[arg(long)]
        reference: PathBuf,
        /// 出力先（24bit PCM WAV）
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_local_logging();

    let args = CliArgs::parse();

    match args.command {
        Command::Event { file } => run_event(file).await,
        Command::Master {
            vocals,
            instrumental,
            reference,
            output,
        } => run_master(vocals, instrumental, reference, output).await,
    }
}

/// SQSイベントファイルを読み込んで処理する
async fn run_event(file: PathBuf) -> Result<(), Error> {
    let config = ServiceConfig::from_env()?;

    let content = tokio::fs::read_to_string(&file).await?;
    let event: SqsEvent = serde_json::from_str(&content)?;

    info!(
        file = %file.display(),
        record_count = event.records.len(),
        bucket = config.bucket_name(),
        "SQSイベントファイルを読み込み"
    );

    let storage = AwsStorageOps::from_config(config.region_name()).await;
    let notifier = WebhookClient::new(config.webhook_url().clone())?;
    let handler = MasteringHandler::new(storage, notifier, PipelineSettings::from_config(&config));

    let result = handler.handle_event(event).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// ローカルファイルだけでマスタリングする
async fn run_master(
    vocals: PathBuf,
    instrumental: PathBuf,
    reference: PathBuf,
    output: PathBuf,
) -> Result<(), Error> {
    let task_output = output.clone();
    let result = tokio::task::spawn_blocking(move || {
        render_master(
            &vocals,
            &instrumental,
            &reference,
            &task_output,
            &MasteringConfig::default(),
        )
    })
    .await?;

    if let Err(err) = result {
        error!(error = %err, "マスタリング失敗");
        return Err(err.into());
    }

    info!(output = %output.display(), "マスタリング完了");
    Ok(())
}
