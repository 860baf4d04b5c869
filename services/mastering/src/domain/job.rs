/// マスタリングジョブ
///
/// SQSメッセージ本文のJSON（`songID`, `fileName`, `trackID`）をパースし、
/// ジョブで扱うS3キーやファイル名を導出する。
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::track::{TrackError, TrackId};

/// 合成ボーカルを格納しているS3プレフィックス
pub const VOCALS_PREFIX: &str = "utau_inference";

/// マスタリング結果をアップロードするS3プレフィックス
pub const OUTPUT_PREFIX: &str = "matchering";

/// ジョブパースのエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// メッセージ本文がJSONオブジェクトではない
    #[error("Invalid message body: {0}")]
    InvalidBody(String),

    /// songIDが未指定
    #[error("songID is missing")]
    MissingSongId,

    /// songIDの型が不正（数値か文字列のみ許可）
    #[error("Invalid songID: {0}")]
    InvalidSongId(String),

    /// fileNameが未指定または空
    #[error("fileName is missing")]
    MissingFileName,

    /// trackIDのエラー
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// 楽曲ID
///
/// 上流システムは数値と文字列のどちらでも送ってくるため、受け取った形式を
/// そのままWebhook通知に返す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SongId {
    Number(i64),
    Text(String),
}

impl SongId {
    /// 本文から楽曲IDを読み取れなかった場合に使うID
    pub fn unknown() -> Self {
        SongId::Number(0)
    }

    /// メッセージ本文からベストエフォートで楽曲IDを取り出す
    ///
    /// ジョブのパースに失敗した場合でもエラー通知に楽曲IDを載せるために使う。
    pub fn from_body_lenient(body: &str) -> Self {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| value.get("songID").cloned())
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_else(Self::unknown)
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongId::Number(n) => write!(f, "{}", n),
            SongId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 1件のマスタリングジョブ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasteringJob {
    song_id: SongId,
    file_name: String,
    track_id: TrackId,
}

impl MasteringJob {
    /// 値を指定してジョブを作成
    pub fn new(song_id: SongId, file_name: impl Into<String>, track_id: TrackId) -> Self {
        Self {
            song_id,
            file_name: file_name.into(),
            track_id,
        }
    }

    /// SQSメッセージ本文からジョブをパースする
    ///
    /// 検証順序: trackID → fileName → songID
    pub fn from_body(body: &str) -> Result<Self, JobError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| JobError::InvalidBody(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| JobError::InvalidBody("expected a JSON object".to_string()))?;

        let track_id = parse_track_id(object.get("trackID"))?;

        let file_name = match object.get("fileName") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            _ => return Err(JobError::MissingFileName),
        };

        let song_id = match object.get("songID") {
            None | Some(Value::Null) => return Err(JobError::MissingSongId),
            Some(value) => serde_json::from_value::<SongId>(value.clone())
                .map_err(|_| JobError::InvalidSongId(value.to_string()))?,
        };

        Ok(Self {
            song_id,
            file_name,
            track_id,
        })
    }

    pub fn song_id(&self) -> &SongId {
        &self.song_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// 合成ボーカルのS3キー
    pub fn vocals_key(&self) -> String {
        format!("{}/{}", VOCALS_PREFIX, self.file_name)
    }

    /// 伴奏音源のS3キー
    pub fn instrumental_key(&self) -> String {
        self.track_id.instrumental_key()
    }

    /// マスタリング結果のファイル名
    pub fn output_file_name(&self) -> String {
        format!("final_song_{}_{}.wav", self.song_id, self.track_id)
    }

    /// マスタリング結果のS3キー
    pub fn output_key(&self) -> String {
        format!("{}/{}", OUTPUT_PREFIX, self.output_file_name())
    }
}

/// trackIDを解決する
///
/// 偽値（未指定、null、false、0、空文字列など）は未指定として扱う。
/// カタログのキーは整数のみなので、`"1"`のような文字列はカタログと一致しない。
fn parse_track_id(value: Option<&Value>) -> Result<TrackId, JobError> {
    let invalid = |raw: String| JobError::from(TrackError::InvalidTrackId(raw));

    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(TrackError::MissingTrackId.into()),
        Some(Value::String(s)) if s.is_empty() => Err(TrackError::MissingTrackId.into()),
        Some(Value::Array(a)) if a.is_empty() => Err(TrackError::MissingTrackId.into()),
        Some(Value::Object(o)) if o.is_empty() => Err(TrackError::MissingTrackId.into()),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) => Ok(TrackId::parse(id)?),
            None if n.as_f64() == Some(0.0) => Err(TrackError::MissingTrackId.into()),
            None => Err(invalid(n.to_string())),
        },
        Some(Value::String(s)) => Err(invalid(s.clone())),
        Some(other) => Err(invalid(other.to_string())),
    }
}
