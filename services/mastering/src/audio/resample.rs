/// サンプリングレート変換（線形補間）
use super::buffer::AudioBuffer;
use super::error::AudioError;

/// バッファを指定レートに変換する
///
/// レートが同じ場合はそのまま複製を返す。
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, AudioError> {
    if target_rate == 0 {
        return Err(AudioError::UnsupportedFormat("sample rate 0".to_string()));
    }
    if buffer.sample_rate() == target_rate {
        return Ok(buffer.clone());
    }

    let ratio = f64::from(buffer.sample_rate()) / f64::from(target_rate);
    let source_frames = buffer.frames();
    let target_frames =
        ((source_frames as f64) * f64::from(target_rate) / f64::from(buffer.sample_rate())).round()
            as usize;

    let channels = buffer
        .channels()
        .iter()
        .map(|channel| interpolate(channel, ratio, target_frames))
        .collect();

    AudioBuffer::new(target_rate, channels)
}

fn interpolate(source: &[f32], ratio: f64, target_frames: usize) -> Vec<f32> {
    let Some(&last) = source.last() else {
        return vec![0.0; target_frames];
    };

    (0..target_frames)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            let fraction = (position - index as f64) as f32;
            match (source.get(index), source.get(index + 1)) {
                (Some(a), Some(b)) => a + (b - a) * fraction,
                (Some(a), None) => *a,
                _ => last,
            }
        })
        .collect()
}
