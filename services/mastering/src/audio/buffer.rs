/// PCM音声バッファ
///
/// チャンネルごとに分離した（planar）f32サンプルを保持する。
/// サンプル値は[-1.0, 1.0]の範囲を想定する。
use super::error::AudioError;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// チャンネルデータから作成する
    ///
    /// チャンネル数0、またはチャンネル間でフレーム数が異なる場合はエラー。
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat("sample rate 0".to_string()));
        }
        let Some(first) = channels.first() else {
            return Err(AudioError::UnsupportedChannels(0));
        };
        let frames = first.len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::UnsupportedFormat(
                "channels have different lengths".to_string(),
            ));
        }

        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// 無音バッファを作成する
    #[cfg(test)]
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count.max(1)],
        }
    }

    /// インターリーブされたサンプル列から作成する
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        samples: &[f32],
    ) -> Result<Self, AudioError> {
        if channel_count == 0 {
            return Err(AudioError::UnsupportedChannels(0));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// 全チャンネルの絶対値ピーク
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// 全サンプルに係数を掛ける
    pub fn scale(&mut self, gain: f32) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// ステレオに変換する
    ///
    /// モノラルは同じ信号を左右に複製する。3チャンネル以上は扱わない。
    pub fn to_stereo(&self) -> Result<Self, AudioError> {
        match self.channel_count() {
            1 => Ok(Self {
                sample_rate: self.sample_rate,
                channels: vec![self.channels[0].clone(), self.channels[0].clone()],
            }),
            2 => Ok(self.clone()),
            n => Err(AudioError::UnsupportedChannels(n)),
        }
    }

    /// 指定チャンネル数に揃える（モノラルからの複製のみ対応）
    pub fn with_channel_count(&self, channel_count: usize) -> Result<Self, AudioError> {
        let current = self.channel_count();
        if current == channel_count {
            return Ok(self.clone());
        }
        if current != 1 {
            return Err(AudioError::UnsupportedChannels(current));
        }
        Ok(Self {
            sample_rate: self.sample_rate,
            channels: vec![self.channels[0].clone(); channel_count],
        })
    }

    /// フレーム数を揃える
    ///
    /// 短ければ末尾に無音を足し、長ければ切り詰める。
    pub fn fit_to_frames(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
    }

    /// インターリーブされたサンプル列に変換する
    #[cfg(test)]
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }
}

/// ステレオ信号をmid/sideに分解する
pub fn lr_to_ms(left: &[f32], right: &[f32]) -> (Vec<f32>, Vec<f32>) {
    left.iter()
        .zip(right)
        .map(|(l, r)| ((l + r) * 0.5, (l - r) * 0.5))
        .unzip()
}

/// mid/sideをステレオ信号に戻す
pub fn ms_to_lr(mid: &[f32], side: &[f32]) -> (Vec<f32>, Vec<f32>) {
    mid.iter()
        .zip(side)
        .map(|(m, s)| (m + s, m - s))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_channels() {
        let result = AudioBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_new_rejects_empty_channels() {
        let result = AudioBuffer::new(44100, vec![]);
        assert!(matches!(result, Err(AudioError::UnsupportedChannels(0))));
    }

    #[test]
    fn test_from_interleaved() {
        let buffer =
            AudioBuffer::from_interleaved(8000, 2, &[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]).unwrap();

        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.interleaved(), vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn test_peak_and_scale() {
        let mut buffer = AudioBuffer::new(8000, vec![vec![0.1, -0.5], vec![0.25, 0.0]]).unwrap();
        assert_eq!(buffer.peak(), 0.5);

        buffer.scale(2.0);
        assert_eq!(buffer.peak(), 1.0);
    }

    #[test]
    fn test_to_stereo() {
        let mono = AudioBuffer::new(8000, vec![vec![0.1, 0.2]]).unwrap();
        let stereo = mono.to_stereo().unwrap();
        assert_eq!(stereo.channel_count(), 2);
        assert_eq!(stereo.channel(1), &[0.1, 0.2]);

        let surround = AudioBuffer::silent(8000, 6, 10);
        assert!(matches!(
            surround.to_stereo(),
            Err(AudioError::UnsupportedChannels(6))
        ));
    }

    #[test]
    fn test_fit_to_frames() {
        let mut buffer = AudioBuffer::new(8000, vec![vec![0.5; 4]]).unwrap();
        buffer.fit_to_frames(6);
        assert_eq!(buffer.channel(0), &[0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);

        buffer.fit_to_frames(2);
        assert_eq!(buffer.channel(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_mid_side_round_trip() {
        let left = vec![0.5, -0.25, 1.0];
        let right = vec![0.25, 0.25, -1.0];

        let (mid, side) = lr_to_ms(&left, &right);
        assert_eq!(mid, vec![0.375, 0.0, 0.0]);
        assert_eq!(side, vec![0.125, -0.25, 1.0]);

        let (l, r) = ms_to_lr(&mid, &side);
        assert_eq!(l, left);
        assert_eq!(r, right);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::silent(8000, 1, 4000);
        assert_eq!(buffer.duration_secs(), 0.5);
    }
}
