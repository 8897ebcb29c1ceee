//! In-memory mono PCM track.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FftFixedIn, Resampler};

use crate::error::{MediaError, MediaResult};

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Mono 16-bit PCM at a fixed sample rate.
///
/// Durations are derived from sample counts, so concatenating tracks never
/// accumulates floating point drift.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcmTrack {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl PcmTrack {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Empty track at the given rate.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(sample_rate, Vec::new())
    }

    /// Digital silence.
    pub fn silence(sample_rate: u32, seconds: f64) -> Self {
        Self::new(sample_rate, vec![0; seconds_to_samples(sample_rate, seconds)])
    }

    /// Sine tone at `frequency` Hz with `gain_db` relative to full scale.
    pub fn tone(sample_rate: u32, seconds: f64, frequency: f64, gain_db: f64) -> Self {
        let amplitude = f64::from(i16::MAX) * 10f64.powf(gain_db / 20.0);
        let step = std::f64::consts::TAU * frequency / f64::from(sample_rate.max(1));
        let samples = (0..seconds_to_samples(sample_rate, seconds))
            .map(|n| (amplitude * (step * n as f64).sin()).round() as i16)
            .collect();
        Self::new(sample_rate, samples)
    }

    /// Decode a WAV payload, downmixing to mono and resampling to `target_rate`.
    pub fn from_wav_bytes(bytes: &[u8], target_rate: u32) -> MediaResult<Self> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f64> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| f64::from(v) * f64::from(i16::MAX)))
                .collect::<Result<_, _>>()?,
            (SampleFormat::Int, bits) if bits <= 16 => {
                // hound yields narrow samples unscaled, e.g. 8-bit as -128..=127
                let scale = f64::from(1u32 << (16 - bits));
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| f64::from(v) * scale))
                    .collect::<Result<_, _>>()?
            }
            (SampleFormat::Int, bits) => {
                let shift = bits.saturating_sub(16);
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| f64::from(v >> shift)))
                    .collect::<Result<_, _>>()?
            }
        };

        let mono: Vec<i16> = interleaved
            .chunks(channels)
            .map(|frame| {
                let mean = frame.iter().sum::<f64>() / frame.len() as f64;
                mean.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
            })
            .collect();

        if mono.is_empty() {
            return Err(MediaError::InvalidMedia("WAV payload has no samples".to_string()));
        }

        Self::new(spec.sample_rate, mono).resampled(target_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Peak absolute sample value.
    pub fn peak(&self) -> u16 {
        self.samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }

    /// Append another track, resampling it first if the rates differ.
    pub fn append(&mut self, other: &PcmTrack) -> MediaResult<()> {
        if other.sample_rate == self.sample_rate {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let converted = other.clone().resampled(self.sample_rate)?;
            self.samples.extend(converted.samples);
        }
        Ok(())
    }

    /// Append `seconds` of silence.
    pub fn append_silence(&mut self, seconds: f64) {
        let n = seconds_to_samples(self.sample_rate, seconds);
        self.samples.resize(self.samples.len() + n, 0);
    }

    /// Band-limited resample to `target_rate`.
    ///
    /// The output holds exactly `round(len * target / source)` samples, so
    /// durations survive the conversion to the sample.
    pub fn resampled(self, target_rate: u32) -> MediaResult<Self> {
        if target_rate == self.sample_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return Ok(Self::new(target_rate, self.samples));
        }

        let source_rate = u64::from(self.sample_rate);
        let expected = ((self.samples.len() as u64 * u64::from(target_rate) + source_rate / 2)
            / source_rate) as usize;

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            target_rate as usize,
            RESAMPLE_CHUNK,
            RESAMPLE_SUB_CHUNKS,
            1,
        )?;
        let delay = resampler.output_delay();
        let wanted = expected + delay;

        let input: Vec<f32> = self.samples.iter().map(|&s| f32::from(s) / 32_768.0).collect();
        let mut out: Vec<f32> = Vec::with_capacity(wanted + RESAMPLE_CHUNK);

        let mut chunks = input.chunks_exact(RESAMPLE_CHUNK);
        for chunk in &mut chunks {
            let frames = resampler.process(&[chunk][..], None)?;
            out.extend_from_slice(&frames[0]);
        }
        let rest = chunks.remainder();
        if !rest.is_empty() {
            let frames = resampler.process_partial(Some(&[rest][..]), None)?;
            out.extend_from_slice(&frames[0]);
        }
        // Flush the filter tail
        while out.len() < wanted {
            let frames = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
            if frames[0].is_empty() {
                break;
            }
            out.extend_from_slice(&frames[0]);
        }

        let mut samples: Vec<i16> = out
            .into_iter()
            .skip(delay)
            .take(expected)
            .map(|v| (v * 32_768.0).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16)
            .collect();
        samples.resize(expected, 0);

        Ok(Self::new(target_rate, samples))
    }

    fn wav_spec(&self, channels: u16) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write_frames<W>(&self, writer: &mut WavWriter<W>, channels: u16) -> MediaResult<()>
    where
        W: std::io::Write + std::io::Seek,
    {
        for &sample in &self.samples {
            for _ in 0..channels {
                writer.write_sample(sample)?;
            }
        }
        Ok(())
    }

    /// Write a 16-bit WAV file, duplicating the mono signal across `channels`.
    pub fn write_wav(&self, path: &Path, channels: u16) -> MediaResult<()> {
        let channels = channels.max(1);
        let mut writer = WavWriter::create(path, self.wav_spec(channels))?;
        self.write_frames(&mut writer, channels)?;
        writer.finalize()?;
        Ok(())
    }

    /// Encode as an in-memory 16-bit WAV.
    pub fn to_wav_bytes(&self, channels: u16) -> MediaResult<Vec<u8>> {
        let channels = channels.max(1);
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.wav_spec(channels))?;
            self.write_frames(&mut writer, channels)?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

/// Sample count for a duration, rounded to the nearest sample.
pub fn seconds_to_samples(sample_rate: u32, seconds: f64) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * f64::from(sample_rate)).round() as usize
}
