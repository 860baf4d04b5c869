/// WAVファイルの読み書き
///
/// 読み込みは整数PCM（8/16/24/32bit）と32bit浮動小数点に対応する。
/// 書き出しは納品形式の24bit PCMを基本とする。
use std::io::{Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::buffer::AudioBuffer;
use super::error::AudioError;

/// 書き出し形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    Pcm16,
    Pcm24,
    Float32,
}

impl WavFormat {
    fn spec(&self, sample_rate: u32, channels: u16) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            WavFormat::Pcm16 => (16, SampleFormat::Int),
            WavFormat::Pcm24 => (24, SampleFormat::Int),
            WavFormat::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// WAVファイルを読み込む
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioBuffer, AudioError> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    debug!(path = %path.display(), spec = ?reader.spec(), "WAV読み込み");
    decode(reader)
}

/// 任意のリーダーからWAVを読み込む
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer, AudioError> {
    decode(WavReader::new(reader)?)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<AudioBuffer, AudioError> {
    let spec = reader.spec();
    let channel_count = usize::from(spec.channels);

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1_u64 << (bits - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (f64::from(v) * scale) as f32))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}bit",
                format, bits
            )));
        }
    };

    AudioBuffer::from_interleaved(spec.sample_rate, channel_count, &samples)
}

/// WAVファイルを書き出す
pub fn write_wav(
    path: impl AsRef<Path>,
    buffer: &AudioBuffer,
    format: WavFormat,
) -> Result<(), AudioError> {
    let path = path.as_ref();
    let spec = output_spec(buffer, format)?;
    let writer = WavWriter::create(path, spec)?;
    encode(writer, buffer, format)?;
    debug!(path = %path.display(), frames = buffer.frames(), "WAV書き出し");
    Ok(())
}

/// 任意のライターへWAVを書き出す
pub fn encode_wav<W: Write + Seek>(
    writer: W,
    buffer: &AudioBuffer,
    format: WavFormat,
) -> Result<(), AudioError> {
    let spec = output_spec(buffer, format)?;
    encode(WavWriter::new(writer, spec)?, buffer, format)
}

fn output_spec(buffer: &AudioBuffer, format: WavFormat) -> Result<WavSpec, AudioError> {
    let channels = u16::try_from(buffer.channel_count())
        .map_err(|_| AudioError::UnsupportedChannels(buffer.channel_count()))?;
    Ok(format.spec(buffer.sample_rate(), channels))
}

fn encode<W: Write + Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    format: WavFormat,
) -> Result<(), AudioError> {
    let frames = buffer.frames();
    let channels = buffer.channels();

    for i in 0..frames {
        for channel in channels {
            let sample = channel[i].clamp(-1.0, 1.0);
            match format {
                WavFormat::Pcm16 => writer.write_sample(quantize(sample, 16) as i16)?,
                WavFormat::Pcm24 => writer.write_sample(quantize(sample, 24))?,
                WavFormat::Float32 => writer.write_sample(sample)?,
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

fn quantize(sample: f32, bits: u32) -> i32 {
    let max = ((1_i64 << (bits - 1)) - 1) as f64;
    (f64::from(sample) * max).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_buffer() -> AudioBuffer {
        AudioBuffer::new(
            22050,
            vec![vec![0.0, 0.5, -0.5, 1.0], vec![0.25, -0.25, 0.75, -1.0]],
        )
        .unwrap()
    }

    fn encode_to_vec(buffer: &AudioBuffer, format: WavFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        encode_wav(&mut cursor, buffer, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_pcm24_keeps_layout_and_precision() {
        let buffer = sample_buffer();
        let bytes = encode_to_vec(&buffer, WavFormat::Pcm24);

        let reader = WavReader::new(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22050);

        let decoded = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.frames(), 4);
        for (a, b) in decoded.interleaved().iter().zip(buffer.interleaved()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_pcm16_clamps_out_of_range() {
        let buffer = AudioBuffer::new(8000, vec![vec![1.5, -2.0]]).unwrap();
        let bytes = encode_to_vec(&buffer, WavFormat::Pcm16);

        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_float32() {
        let buffer = sample_buffer();
        let decoded = decode_wav(Cursor::new(encode_to_vec(&buffer, WavFormat::Float32))).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_decode_8bit() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(64_i8).unwrap();
            writer.write_sample(-128_i8).unwrap();
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(decoded.channel(0), &[0.5, -1.0]);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        write_wav(&path, &sample_buffer(), WavFormat::Pcm24).unwrap();
        let decoded = read_wav(&path).unwrap();

        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 22050);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_wav("/nonexistent/dir/file.wav");
        assert!(matches!(result, Err(AudioError::Wav(_))));
    }
}
