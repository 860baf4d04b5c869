// 音声処理モジュール
pub mod buffer;
pub mod error;
pub mod mastering;
pub mod mix;
pub mod resample;
pub mod wav;

// 再エクスポート
pub use buffer::AudioBuffer;
pub use error::AudioError;
pub use mastering::{LimiterConfig, MasteringConfig, master};
pub use mix::mix_tracks;
pub use wav::{WavFormat, read_wav, write_wav};
