/// ボーカルと伴奏のミックス
use tracing::debug;

use super::buffer::AudioBuffer;
use super::error::AudioError;
use super::resample::resample;

/// ボーカルを伴奏に重ねる
///
/// # 処理
/// 1. 高い方のサンプリングレート、多い方のチャンネル数に揃える
/// 2. ボーカルを伴奏の長さに合わせる（短ければ無音で埋め、長ければ切り詰める）
/// 3. サンプルごとに加算し、[-1.0, 1.0]で飽和させる
///
/// 結果の長さは常に伴奏と同じになる。
pub fn mix_tracks(
    vocals: &AudioBuffer,
    instrumental: &AudioBuffer,
) -> Result<AudioBuffer, AudioError> {
    let sample_rate = vocals.sample_rate().max(instrumental.sample_rate());
    let channel_count = vocals.channel_count().max(instrumental.channel_count());

    let instrumental = resample(instrumental, sample_rate)?.with_channel_count(channel_count)?;
    let mut vocals = resample(vocals, sample_rate)?.with_channel_count(channel_count)?;

    debug!(
        sample_rate = sample_rate,
        channels = channel_count,
        vocals_frames = vocals.frames(),
        instrumental_frames = instrumental.frames(),
        "トラックをミックス"
    );

    vocals.fit_to_frames(instrumental.frames());

    let channels = vocals
        .channels()
        .iter()
        .zip(instrumental.channels())
        .map(|(v, i)| {
            v.iter()
                .zip(i)
                .map(|(a, b)| (a + b).clamp(-1.0, 1.0))
                .collect()
        })
        .collect();

    AudioBuffer::new(sample_rate, channels)
}
