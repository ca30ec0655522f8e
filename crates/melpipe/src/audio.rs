//! PCM input helpers.
//!
//! - minimal WAV chunk walker that borrows the 16-bit PCM payload
//! - synthetic tone generation for tests, benches and golden files

use crate::constants::{BYTES_PER_SAMPLE, PCM_SCALE, SAMPLE_RATE_HZ};

/// A WAV file's `fmt ` fields and a borrowed view of its `data` chunk.
#[derive(Debug, Clone, Copy)]
pub struct WavPcm<'a> {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data: &'a [u8],
}

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("not a valid WAV file")]
    InvalidHeader,
    #[error("unsupported WAV encoding (need PCM, got format tag {0})")]
    UnsupportedEncoding(u16),
    #[error("malformed WAV chunks")]
    MalformedChunks,
    #[error(
        "WAV must be {expected_hz} Hz mono 16-bit, got {sample_rate_hz} Hz, {channels} ch, {bits_per_sample}-bit"
    )]
    WrongLayout {
        expected_hz: u32,
        sample_rate_hz: u32,
        channels: u16,
        bits_per_sample: u16,
    },
}

fn read_u16_le(p: &[u8]) -> u16 {
    u16::from_le_bytes([p[0], p[1]])
}

fn read_u32_le(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Quick RIFF/WAVE signature check.
#[must_use]
pub fn looks_like_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Walk the RIFF chunks of `data` and return the PCM payload without copying it.
pub fn parse_wav_pcm(data: &[u8]) -> Result<WavPcm<'_>, WavError> {
    if data.len() < 44 || !looks_like_wav(data) {
        return Err(WavError::InvalidHeader);
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut pcm_data: Option<&[u8]> = None;

    let mut p = 12usize;
    while p + 8 <= data.len() {
        let chunk_id = &data[p..p + 4];
        let chunk_size = read_u32_le(&data[p + 4..p + 8]) as usize;
        let chunk_data_start = p + 8;
        let chunk_data_end = chunk_data_start.saturating_add(chunk_size);
        if chunk_data_end > data.len() {
            return Err(WavError::MalformedChunks);
        }

        if chunk_id == b"fmt " && chunk_size >= 16 {
            let c = &data[chunk_data_start..chunk_data_end];
            fmt = Some((
                read_u16_le(&c[0..2]),
                read_u16_le(&c[2..4]),
                read_u32_le(&c[4..8]),
                read_u16_le(&c[14..16]),
            ));
        } else if chunk_id == b"data" {
            pcm_data = Some(&data[chunk_data_start..chunk_data_end]);
        }

        p = chunk_data_end;
        if chunk_size & 1 == 1 {
            p = p.saturating_add(1);
        }
    }

    let (Some((audio_format, channels, sample_rate_hz, bits_per_sample)), Some(pcm_data)) =
        (fmt, pcm_data)
    else {
        return Err(WavError::MalformedChunks);
    };

    if audio_format != 1 {
        return Err(WavError::UnsupportedEncoding(audio_format));
    }

    Ok(WavPcm {
        sample_rate_hz,
        channels,
        bits_per_sample,
        data: pcm_data,
    })
}

impl<'a> WavPcm<'a> {
    /// Return the payload if it is already in the pipeline's input layout.
    /// No resampling or downmixing is done.
    pub fn require_pipeline_format(&self) -> Result<&'a [u8], WavError> {
        if self.sample_rate_hz != SAMPLE_RATE_HZ || self.channels != 1 || self.bits_per_sample != 16
        {
            return Err(WavError::WrongLayout {
                expected_hz: SAMPLE_RATE_HZ,
                sample_rate_hz: self.sample_rate_hz,
                channels: self.channels,
                bits_per_sample: self.bits_per_sample,
            });
        }
        Ok(self.data)
    }
}

/// Quantize `[-1, 1]` samples to s16le bytes, saturating out-of-range values.
#[must_use]
pub fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &s in samples {
        let q = (f64::from(s) * PCM_SCALE)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        out.extend_from_slice(&q.to_le_bytes());
    }
    out
}

/// `n_samples` of a sine at `freq_hz`, 16 kHz, as s16le bytes.
#[must_use]
pub fn sine_pcm(freq_hz: f64, amplitude: f32, n_samples: usize) -> Vec<u8> {
    let samples: Vec<f32> = (0..n_samples)
        .map(|i| {
            let t = (i as f64) / f64::from(SAMPLE_RATE_HZ);
            (f64::from(amplitude) * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as f32
        })
        .collect();
    encode_pcm(&samples)
}

/// Wrap s16le mono 16 kHz bytes in a canonical 44-byte WAV header.
#[must_use]
pub fn wav_from_pcm(pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE_HZ.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE_HZ * 2).to_le_bytes()); // byte rate
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
