//! リファレンスマスタリング
//!
//! ターゲット（ミックス済み音源）の音量と周波数バランスをリファレンス音源に
//! 合わせ、ブリックウォールリミッターで仕上げる。
//!
//! 処理の流れ:
//! 1. 入力チェック（レート変換、ステレオ化、長さ・無音・同一性の検証）
//! 2. リファレンスをピーク正規化
//! 3. mid/side分解と最大音量区間の抽出
//! 4. レベルマッチング
//! 5. 周波数マッチング（線形位相FIR）
//! 6. クリップを考慮したレベル補正
//! 7. L/Rに戻してリミッター
mod analysis;
mod limiter;
mod spectrum;

pub use limiter::{LimiterConfig, LimiterStats};

use tracing::{debug, info, warn};

use super::buffer::{AudioBuffer, lr_to_ms, ms_to_lr};
use super::error::AudioError;
use super::resample::resample;
use analysis::{loudest_pieces, loudest_rms, piece_size, pieces, pieces_rms};
use spectrum::{SpectrumAnalyzer, convolve_same, matching_curve, smooth_octaves};

/// マスタリング設定
#[derive(Debug, Clone, PartialEq)]
pub struct MasteringConfig {
    /// 内部処理・出力のサンプリングレート
    pub internal_sample_rate: u32,
    /// 入力の最大長（秒）
    pub max_length_secs: f64,
    /// 出力ピークの上限
    pub threshold: f32,
    /// ゼロ除算防止の下限値
    pub min_value: f32,
    /// STFT/FIRのサイズ（2のべき乗）
    pub fft_size: usize,
    /// 解析区間の最大長（秒）
    pub max_piece_secs: f64,
    /// レベル補正の反復回数
    pub rms_correction_steps: usize,
    /// マッチングカーブの平滑化幅（オクターブ）
    pub smoothing_octaves: f32,
    /// マッチングカーブの最大ブースト/カット（dB）
    pub max_gain_db: f32,
    /// この数以上のサンプルがクリップしていたら警告する
    pub clipping_samples_threshold: usize,
    pub limiter: LimiterConfig,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            internal_sample_rate: 44100,
            max_length_secs: 15.0 * 60.0,
            threshold: (32768.0 - 61.0) / 32768.0,
            min_value: 1e-6,
            fft_size: 4096,
            max_piece_secs: 15.0,
            rms_correction_steps: 4,
            smoothing_octaves: 1.0 / 6.0,
            max_gain_db: 24.0,
            clipping_samples_threshold: 8,
            limiter: LimiterConfig::default(),
        }
    }
}

impl MasteringConfig {
    /// 設定値を検証する
    pub fn validate(&self) -> Result<(), AudioError> {
        let invalid = |message: &str| Err(AudioError::InvalidConfig(message.to_string()));

        if self.internal_sample_rate == 0 {
            return invalid("internal_sample_rate must be positive");
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return invalid("threshold must be in (0, 1]");
        }
        if self.min_value <= 0.0 {
            return invalid("min_value must be positive");
        }
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return invalid("fft_size must be a power of two >= 64");
        }
        if self.max_piece_frames() < self.fft_size {
            return invalid("max_piece_secs must cover at least one fft_size");
        }
        if self.max_length_secs <= 0.0 {
            return invalid("max_length_secs must be positive");
        }
        if self.smoothing_octaves <= 0.0 {
            return invalid("smoothing_octaves must be positive");
        }
        if self.max_gain_db < 0.0 {
            return invalid("max_gain_db must not be negative");
        }
        Ok(())
    }

    fn max_piece_frames(&self) -> usize {
        (self.max_piece_secs * f64::from(self.internal_sample_rate)) as usize
    }

    fn max_gain(&self) -> f32 {
        10.0_f32.powf(self.max_gain_db / 20.0)
    }
}

/// ステレオ信号のmid/side表現と解析結果
struct MidSide {
    mid: Vec<f32>,
    side: Vec<f32>,
    piece_size: usize,
    loudest: Vec<usize>,
}

impl MidSide {
    fn analyze(buffer: &AudioBuffer, max_piece_frames: usize) -> Self {
        let (mid, side) = lr_to_ms(buffer.channel(0), buffer.channel(1));
        let piece_size = piece_size(mid.len(), max_piece_frames);
        let loudest = loudest_pieces(&mid, piece_size);
        Self {
            mid,
            side,
            piece_size,
            loudest,
        }
    }

    fn loudest_rms(&self) -> f32 {
        pieces_rms(&self.mid, self.piece_size, &self.loudest)
    }

    fn scale(&mut self, gain: f32) {
        for sample in self.mid.iter_mut().chain(self.side.iter_mut()) {
            *sample *= gain;
        }
    }

    fn loudest_slices<'a>(&self, signal: &'a [f32]) -> Vec<&'a [f32]> {
        pieces(signal, self.piece_size)
            .enumerate()
            .filter(|(i, _)| self.loudest.contains(i))
            .map(|(_, piece)| piece)
            .collect()
    }
}

/// ターゲットをリファレンスに合わせてマスタリングする
///
/// 出力は`internal_sample_rate`のステレオで、ピークは`threshold`以下。
pub fn master(
    target: &AudioBuffer,
    reference: &AudioBuffer,
    config: &MasteringConfig,
) -> Result<AudioBuffer, AudioError> {
    config.validate()?;

    let target = prepare("target", target, config)?;
    let mut reference = prepare("reference", reference, config)?;

    if target == reference {
        return Err(AudioError::IdenticalInputs);
    }

    let clipped = target
        .channels()
        .iter()
        .flat_map(|c| c.iter())
        .filter(|s| s.abs() >= 1.0)
        .count();
    if clipped >= config.clipping_samples_threshold {
        warn!(clipped_samples = clipped, "ターゲットがクリップしています");
    }

    // リファレンスのピークを閾値に正規化
    let reference_peak = reference.peak();
    if reference_peak < config.min_value {
        return Err(AudioError::Silent("reference"));
    }
    reference.scale(config.threshold / reference_peak);

    let max_piece_frames = config.max_piece_frames();
    let mut target_ms = MidSide::analyze(&target, max_piece_frames);
    let reference_ms = MidSide::analyze(&reference, max_piece_frames);

    let reference_rms = reference_ms.loudest_rms();
    if reference_rms < config.min_value {
        return Err(AudioError::Silent("reference"));
    }

    // レベルマッチング
    let target_rms = target_ms.loudest_rms();
    if target_rms < config.min_value {
        return Err(AudioError::Silent("target"));
    }
    let rms_coefficient = reference_rms / target_rms;
    target_ms.scale(rms_coefficient);
    debug!(
        target_rms = target_rms,
        reference_rms = reference_rms,
        rms_coefficient = rms_coefficient,
        "レベルマッチング"
    );

    // 周波数マッチング
    let analyzer = SpectrumAnalyzer::new(config.fft_size);
    let mid_fir = matching_fir(
        &analyzer,
        &target_ms.loudest_slices(&target_ms.mid),
        &reference_ms.loudest_slices(&reference_ms.mid),
        config,
    );
    let side_fir = matching_fir(
        &analyzer,
        &target_ms.loudest_slices(&target_ms.side),
        &reference_ms.loudest_slices(&reference_ms.side),
        config,
    );
    target_ms.mid = convolve_same(&target_ms.mid, &mid_fir);
    target_ms.side = convolve_same(&target_ms.side, &side_fir);
    debug!("周波数マッチング完了");

    // クリップ後のRMSがリファレンスに近づくよう補正
    for step in 0..config.rms_correction_steps {
        let clipped_mid: Vec<f32> = target_ms
            .mid
            .iter()
            .map(|s| s.clamp(-config.threshold, config.threshold))
            .collect();
        let clipped_rms = loudest_rms(&clipped_mid, target_ms.piece_size);
        if clipped_rms < config.min_value {
            break;
        }
        let coefficient = reference_rms / clipped_rms;
        target_ms.scale(coefficient);
        debug!(step = step, coefficient = coefficient, "レベル補正");
    }

    // L/Rに戻してリミッター
    let (left, right) = ms_to_lr(&target_ms.mid, &target_ms.side);
    let mut channels = vec![left, right];
    let stats = limiter::limit(
        &mut channels,
        config.internal_sample_rate,
        config.threshold,
        &config.limiter,
    );

    let result = AudioBuffer::new(config.internal_sample_rate, channels)?;
    info!(
        frames = result.frames(),
        duration_secs = result.duration_secs(),
        limited_frames = stats.limited_frames,
        peak = result.peak(),
        "マスタリング完了"
    );

    Ok(result)
}

/// 入力をチェックし、内部レートのステレオに揃える
fn prepare(
    what: &'static str,
    buffer: &AudioBuffer,
    config: &MasteringConfig,
) -> Result<AudioBuffer, AudioError> {
    let seconds = buffer.duration_secs();
    if seconds > config.max_length_secs {
        return Err(AudioError::TooLong {
            what,
            seconds,
            maximum: config.max_length_secs,
        });
    }

    let buffer = resample(buffer, config.internal_sample_rate)?.to_stereo()?;
    if buffer.frames() < config.fft_size {
        return Err(AudioError::TooShort {
            what,
            frames: buffer.frames(),
            minimum: config.fft_size,
        });
    }
    if buffer.peak() < config.min_value {
        return Err(AudioError::Silent(what));
    }

    Ok(buffer)
}

fn matching_fir(
    analyzer: &SpectrumAnalyzer,
    target: &[&[f32]],
    reference: &[&[f32]],
    config: &MasteringConfig,
) -> Vec<f32> {
    let target_spectrum = analyzer.average_spectrum(target.iter().copied());
    let reference_spectrum = analyzer.average_spectrum(reference.iter().copied());
    let curve = matching_curve(
        &target_spectrum,
        &reference_spectrum,
        config.min_value,
        config.max_gain(),
    );
    analyzer.design_fir(&smooth_octaves(&curve, config.smoothing_octaves))
}
