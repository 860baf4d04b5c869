/// 伴奏トラックのカタログ
///
/// ジョブの`trackID`から、S3上のインストゥルメンタル音源のキーを解決する。
use std::fmt;

use thiserror::Error;

/// 伴奏音源を格納しているS3プレフィックス
pub const INSTRUMENTAL_PREFIX: &str = "static/audio";

/// トラックID解決のエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// trackIDが未指定（0を含む）
    #[error("track ID is missing")]
    MissingTrackId,

    /// カタログに存在しないtrackID（受け取った値の表記を保持）
    #[error("Invalid trackID: {0}")]
    InvalidTrackId(String),
}

/// 伴奏トラックID
///
/// カタログに登録済みのIDのみを保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(u32);

impl TrackId {
    /// 数値からTrackIdを生成する
    ///
    /// 0は未指定として扱う。
    pub fn parse(value: i64) -> Result<Self, TrackError> {
        if value == 0 {
            return Err(TrackError::MissingTrackId);
        }

        match u32::try_from(value) {
            Ok(id) if instrumental_file_name(id).is_some() => Ok(Self(id)),
            _ => Err(TrackError::InvalidTrackId(value.to_string())),
        }
    }

    /// 数値表現を取得
    #[cfg(test)]
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// 伴奏音源のファイル名を取得
    pub fn instrumental_file_name(&self) -> &'static str {
        // parseで検証済みのため常にSome
        instrumental_file_name(self.0).unwrap_or_default()
    }

    /// 伴奏音源のS3キーを取得
    pub fn instrumental_key(&self) -> String {
        format!("{}/{}", INSTRUMENTAL_PREFIX, self.instrumental_file_name())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn instrumental_file_name(id: u32) -> Option<&'static str> {
    match id {
        1 => Some("pop_track1.wav"),
        2 => Some("norteno_track2.wav"),
        3 => Some("urbano_track3.wav"),
        _ => None,
    }
}
