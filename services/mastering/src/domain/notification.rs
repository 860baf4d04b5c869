/// ステータス通知
///
/// 上流システムのWebhookに送る進捗通知のペイロード。
use serde::Serialize;

use super::job::SongId;

/// このLambdaが担当する処理ステージ名
pub const STAGE: &str = "matchering";

/// 通知アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Start,
    End,
    Error,
}

/// Webhookに送る通知
///
/// `fileName`は`end`でのみ、`errMsg`は`error`でのみ値を持ち、それ以外はnull。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusNotification {
    #[serde(rename = "songID")]
    pub song_id: SongId,
    pub stage: &'static str,
    pub action: NotificationAction,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "errMsg")]
    pub err_msg: Option<String>,
}

impl StatusNotification {
    /// 処理開始通知
    pub fn start(song_id: SongId) -> Self {
        Self {
            song_id,
            stage: STAGE,
            action: NotificationAction::Start,
            file_name: None,
            err_msg: None,
        }
    }

    /// 処理完了通知（成果物のファイル名付き）
    pub fn end(song_id: SongId, file_name: impl Into<String>) -> Self {
        Self {
            song_id,
            stage: STAGE,
            action: NotificationAction::End,
            file_name: Some(file_name.into()),
            err_msg: None,
        }
    }

    /// エラー通知
    pub fn error(song_id: SongId, err_msg: impl Into<String>) -> Self {
        Self {
            song_id,
            stage: STAGE,
            action: NotificationAction::Error,
            file_name: None,
            err_msg: Some(err_msg.into()),
        }
    }
}
