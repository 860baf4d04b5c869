//! 周波数マッチング
//!
//! 平均振幅スペクトルの比からマッチングカーブを作り、線形位相FIRとして
//! 信号に畳み込む。

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// STFTによる平均振幅スペクトル解析とFIR設計を行う
pub struct SpectrumAnalyzer {
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// `fft_size`は2のべき乗であること（MasteringConfigで検証済み）
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft_size,
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            window: hann(fft_size),
        }
    }

    /// ビン数（fft_size / 2 + 1）
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// 区間群の平均振幅スペクトル
    ///
    /// 区間ごとに50%オーバーラップのSTFTで平均を取り、さらに区間間で平均する。
    /// 区間がfft_sizeより短い場合はゼロ詰めした1フレームとして扱う。
    pub fn average_spectrum<'a>(&self, pieces: impl IntoIterator<Item = &'a [f32]>) -> Vec<f32> {
        let bins = self.bins();
        let mut total = vec![0.0_f64; bins];
        let mut piece_count = 0_usize;

        for piece in pieces {
            let spectrum = self.piece_spectrum(piece);
            for (acc, value) in total.iter_mut().zip(&spectrum) {
                *acc += *value;
            }
            piece_count += 1;
        }

        if piece_count == 0 {
            return vec![0.0; bins];
        }
        total
            .into_iter()
            .map(|v| (v / piece_count as f64) as f32)
            .collect()
    }

    fn piece_spectrum(&self, piece: &[f32]) -> Vec<f64> {
        let bins = self.bins();
        let hop = self.fft_size / 2;
        let mut total = vec![0.0_f64; bins];
        let mut frame_count = 0_usize;
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.fft_size];

        let mut start = 0;
        loop {
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = piece.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);

            for (acc, value) in total.iter_mut().zip(&buffer[..bins]) {
                *acc += f64::from(value.norm());
            }
            frame_count += 1;

            start += hop;
            if start + self.fft_size > piece.len() {
                break;
            }
        }

        for acc in &mut total {
            *acc /= frame_count as f64;
        }
        total
    }

    /// マッチングカーブから線形位相FIRを設計する
    ///
    /// 戻り値の長さはfft_sizeで、中心タップはfft_size / 2。
    pub fn design_fir(&self, curve: &[f32]) -> Vec<f32> {
        let n = self.fft_size;
        let half = n / 2;
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); n];

        for (k, gain) in curve.iter().take(half + 1).enumerate() {
            buffer[k] = Complex::new(*gain, 0.0);
            if k > 0 && k < half {
                buffer[n - k] = Complex::new(*gain, 0.0);
            }
        }
        self.inverse.process(&mut buffer);

        let scale = 1.0 / n as f32;
        (0..n)
            .map(|i| buffer[(i + half) % n].re * scale * self.window[i])
            .collect()
    }
}

/// 周期Hann窓
fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

/// リファレンス/ターゲットの比からマッチングカーブを作る
///
/// ゲインは`[1 / max_gain, max_gain]`に制限する。
pub fn matching_curve(target: &[f32], reference: &[f32], min_value: f32, max_gain: f32) -> Vec<f32> {
    let min_gain = 1.0 / max_gain;
    target
        .iter()
        .zip(reference)
        .map(|(t, r)| (r / t.max(min_value)).clamp(min_gain, max_gain))
        .collect()
}

/// 分数オクターブ平滑化
///
/// 各ビンkについて[k / 2^(w/2), k * 2^(w/2)]の範囲を平均する。
pub fn smooth_octaves(values: &[f32], octaves: f32) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0_f64);
    for value in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + f64::from(*value));
    }

    let factor = 2.0_f64.powf(f64::from(octaves) / 2.0);
    let last_index = values.len() - 1;

    (0..values.len())
        .map(|k| {
            if k == 0 {
                return values[0];
            }
            let lower = ((k as f64 / factor).floor() as usize).max(1);
            let upper = ((k as f64 * factor).ceil() as usize).min(last_index);
            let sum = prefix[upper + 1] - prefix[lower];
            (sum / (upper - lower + 1) as f64) as f32
        })
        .collect()
}

/// オーバーラップ加算によるFFT畳み込み
///
/// 出力は入力と同じ長さで、FIRの中心タップ分の遅延を補正する。
pub fn convolve_same(signal: &[f32], fir: &[f32]) -> Vec<f32> {
    if signal.is_empty() || fir.is_empty() {
        return signal.to_vec();
    }

    let taps = fir.len();
    let fft_len = (taps * 4).next_power_of_two();
    let block = fft_len - taps + 1;

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut kernel: Vec<Complex<f32>> = fir.iter().map(|h| Complex::new(*h, 0.0)).collect();
    kernel.resize(fft_len, Complex::new(0.0, 0.0));
    forward.process(&mut kernel);

    let mut output = vec![0.0_f32; signal.len() + taps - 1];
    let mut buffer = vec![Complex::new(0.0_f32, 0.0); fft_len];
    let scale = 1.0 / fft_len as f32;

    for (index, chunk) in signal.chunks(block).enumerate() {
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(chunk.get(i).copied().unwrap_or(0.0), 0.0);
        }
        forward.process(&mut buffer);
        for (value, h) in buffer.iter_mut().zip(&kernel) {
            *value *= *h;
        }
        inverse.process(&mut buffer);

        let offset = index * block;
        let produced = chunk.len() + taps - 1;
        for (out, value) in output[offset..offset + produced].iter_mut().zip(&buffer) {
            *out += value.re * scale;
        }
    }

    let delay = taps / 2;
    output[delay..delay + signal.len()].to_vec()
}
