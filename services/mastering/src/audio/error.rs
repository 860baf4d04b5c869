/// 音声処理のエラー型
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    /// WAVの読み書きエラー
    #[error("WAV codec error: {0}")]
    Wav(#[from] hound::Error),

    /// 対応していないサンプル形式
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// 対応していないチャンネル構成
    #[error("Unsupported channel layout: {0} channels")]
    UnsupportedChannels(usize),

    /// 解析に必要な長さに満たない
    #[error("{what} audio is too short: {frames} frames (minimum {minimum})")]
    TooShort {
        what: &'static str,
        frames: usize,
        minimum: usize,
    },

    /// 許容時間を超えている
    #[error("{what} audio is too long: {seconds:.1} s (maximum {maximum:.1} s)")]
    TooLong {
        what: &'static str,
        seconds: f64,
        maximum: f64,
    },

    /// 無音
    #[error("{0} audio is silent")]
    Silent(&'static str),

    /// ターゲットとリファレンスが同一
    #[error("Target and reference audio are identical")]
    IdenticalInputs,

    /// 設定値が不正
    #[error("Invalid mastering config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AudioError::TooShort {
            what: "target",
            frames: 10,
            minimum: 4096,
        };
        assert_eq!(
            err.to_string(),
            "target audio is too short: 10 frames (minimum 4096)"
        );

        let err = AudioError::TooLong {
            what: "reference",
            seconds: 901.34,
            maximum: 900.0,
        };
        assert_eq!(
            err.to_string(),
            "reference audio is too long: 901.3 s (maximum 900.0 s)"
        );

        assert_eq!(AudioError::Silent("target").to_string(), "target audio is silent");
        assert_eq!(
            AudioError::UnsupportedChannels(6).to_string(),
            "Unsupported channel layout: 6 channels"
        );
    }
}
