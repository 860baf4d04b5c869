//! 区間分割とRMS解析
//!
//! 信号を等長の区間に分け、平均以上の音量を持つ区間（最大音量区間）だけで
//! レベルやスペクトルを測る。静かなイントロやアウトロは測定に含めない。

/// 区間長を求める
///
/// `max_piece_frames`以下の等長区間に分割したときの区間長。端数は捨てる。
pub fn piece_size(frames: usize, max_piece_frames: usize) -> usize {
    let max_piece_frames = max_piece_frames.max(1);
    let count = frames.div_ceil(max_piece_frames).max(1);
    (frames / count).max(1)
}

/// 区間ごとのスライス
pub fn pieces(signal: &[f32], piece_size: usize) -> impl Iterator<Item = &[f32]> {
    signal.chunks_exact(piece_size.max(1))
}

/// 二乗平均
pub fn mean_square(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|s| f64::from(*s).powi(2)).sum::<f64>() / signal.len() as f64
}

/// RMS
pub fn rms(signal: &[f32]) -> f32 {
    mean_square(signal).sqrt() as f32
}

/// 平均RMS以上の区間のインデックスを返す
pub fn loudest_pieces(signal: &[f32], piece_size: usize) -> Vec<usize> {
    let levels: Vec<f32> = pieces(signal, piece_size).map(rms).collect();
    if levels.is_empty() {
        return Vec::new();
    }
    let mean = levels.iter().sum::<f32>() / levels.len() as f32;

    levels
        .iter()
        .enumerate()
        .filter(|(_, level)| **level >= mean)
        .map(|(i, _)| i)
        .collect()
}

/// 指定区間群をまとめたRMS
pub fn pieces_rms(signal: &[f32], piece_size: usize, indices: &[usize]) -> f32 {
    let selected: Vec<f64> = pieces(signal, piece_size)
        .enumerate()
        .filter(|(i, _)| indices.contains(i))
        .map(|(_, piece)| mean_square(piece))
        .collect();

    if selected.is_empty() {
        return 0.0;
    }
    (selected.iter().sum::<f64>() / selected.len() as f64).sqrt() as f32
}

/// 最大音量区間のRMS
pub fn loudest_rms(signal: &[f32], piece_size: usize) -> f32 {
    let indices = loudest_pieces(signal, piece_size);
    pieces_rms(signal, piece_size, &indices)
}
