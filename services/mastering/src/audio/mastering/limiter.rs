//! 先読みブリックウォールリミッター
//!
//! 全チャンネル共通のゲインエンベロープを計算し、どのサンプルも閾値を
//! 超えないようにする。

use std::collections::VecDeque;

/// リミッターの時定数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterConfig {
    pub attack_ms: f32,
    pub hold_ms: f32,
    pub release_ms: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            attack_ms: 1.0,
            hold_ms: 1.0,
            release_ms: 3000.0,
        }
    }
}

/// リミッター適用結果の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// 閾値を超えていたサンプル（フレーム）数
    pub limited_frames: usize,
}

/// チャンネル群にリミッターを適用する
///
/// # 処理
/// 1. フレームごとの超過率 `max(1, peak / threshold)` を求める
/// 2. [i - hold, i + attack] の窓で最大値を取る（先読み + ホールド）
/// 3. 後ろ向きの指数平滑でアタックを滑らかにする
/// 4. 前向きの指数平滑でリリースさせる
/// 5. 逆数をゲインとして掛け、最後に閾値でハードクリップする
///
/// 2〜4はいずれも超過率を下回らないため、3で滑らかにした後も閾値は守られる。
pub fn limit(
    channels: &mut [Vec<f32>],
    sample_rate: u32,
    threshold: f32,
    config: &LimiterConfig,
) -> LimiterStats {
    let frames = channels.first().map_or(0, Vec::len);
    if frames == 0 {
        return LimiterStats::default();
    }

    let rectified: Vec<f32> = (0..frames)
        .map(|i| {
            let peak = channels.iter().fold(0.0_f32, |acc, c| acc.max(c[i].abs()));
            (peak / threshold).max(1.0)
        })
        .collect();
    let limited_frames = rectified.iter().filter(|r| **r > 1.0).count();
    if limited_frames == 0 {
        return LimiterStats::default();
    }

    let attack = ms_to_frames(config.attack_ms, sample_rate);
    let hold = ms_to_frames(config.hold_ms, sample_rate);
    let release = ms_to_frames(config.release_ms, sample_rate);

    let mut envelope = sliding_max(&rectified, hold, attack);

    let attack_coefficient = (-1.0 / attack as f32).exp();
    for i in (0..frames.saturating_sub(1)).rev() {
        let decayed = 1.0 + (envelope[i + 1] - 1.0) * attack_coefficient;
        envelope[i] = envelope[i].max(decayed);
    }

    let release_coefficient = (-1.0 / release as f32).exp();
    for i in 1..frames {
        let decayed = 1.0 + (envelope[i - 1] - 1.0) * release_coefficient;
        envelope[i] = envelope[i].max(decayed);
    }

    for channel in channels.iter_mut() {
        for (sample, reduction) in channel.iter_mut().zip(&envelope) {
            *sample = (*sample / reduction).clamp(-threshold, threshold);
        }
    }

    LimiterStats { limited_frames }
}

fn ms_to_frames(ms: f32, sample_rate: u32) -> usize {
    ((ms * sample_rate as f32 / 1000.0).round() as usize).max(1)
}

/// [i - behind, i + ahead]の範囲の最大値（単調デックによるO(n)）
fn sliding_max(values: &[f32], behind: usize, ahead: usize) -> Vec<f32> {
    let n = values.len();
    let mut output = Vec::with_capacity(n);
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let upper = (i + ahead).min(n - 1);
        while next <= upper {
            while window.back().is_some_and(|&b| values[b] <= values[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }

        let lower = i.saturating_sub(behind);
        while window.front().is_some_and(|&f| f < lower) {
            window.pop_front();
        }

        output.push(window.front().map_or(1.0, |&f| values[f]));
    }

    output
}
