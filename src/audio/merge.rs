/*!
 * Audio concatenation.
 *
 * Inputs are decoded one at a time, normalised to the target channel count
 * and sample rate, then appended. WAV output is written directly; every
 * other container goes through a temporary WAV and ffmpeg.
 */

use log::{debug, error, info, warn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::ExportConfig;
use crate::audio::decode::decode_file;
use crate::audio::AudioFormat;
use crate::errors::MergeError;

/// Upper bound for one ffmpeg encode
const ENCODE_TIMEOUT: Duration = Duration::from_secs(600);

/// Target parameters of a merged file
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSettings {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for MergeSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            format: config.format,
            sample_rate: config.sample_rate,
            channels: config.channels,
            bitrate: config.bitrate.clone(),
        }
    }
}

/// Summary of a successful merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Inputs that made it into the output
    pub used: usize,
    /// Inputs skipped as missing or unreadable
    pub skipped: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AudioMerger {
    settings: MergeSettings,
}

impl AudioMerger {
    pub fn new(settings: MergeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Merge `inputs` into `output`, returning whether an output file was produced
    pub async fn merge(&self, inputs: &[PathBuf], output: &Path) -> bool {
        match self.merge_report(inputs, output).await {
            Ok(report) => {
                info!(
                    "Merged {} file(s) into {:?} ({} skipped, {} ms)",
                    report.used, output, report.skipped, report.duration_ms
                );
                true
            }
            Err(e) => {
                error!("Merge into {:?} failed: {}", output, e);
                false
            }
        }
    }

    /// Merge `inputs` into `output`
    pub async fn merge_report(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<MergeReport, MergeError> {
        let settings = self.settings.clone();
        let paths = inputs.to_vec();
        let (samples, used, skipped) =
            tokio::task::spawn_blocking(move || concatenate(&paths, &settings))
                .await
                .map_err(|e| MergeError::Encode(format!("Merge task panicked: {}", e)))??;

        if used == 0 || samples.is_empty() {
            return Err(MergeError::EmptyMerge);
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let frames = samples.len() / self.settings.channels.max(1) as usize;
        let duration_ms = frames as u64 * 1000 / self.settings.sample_rate.max(1) as u64;

        let result = if self.settings.format == AudioFormat::Wav {
            let settings = self.settings.clone();
            let dest = output.to_path_buf();
            tokio::task::spawn_blocking(move || write_wav(&dest, &samples, &settings))
                .await
                .map_err(|e| MergeError::Encode(format!("WAV writer panicked: {}", e)))
                .and_then(|r| r)
        } else {
            self.encode_with_ffmpeg(samples, output).await
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(output).await;
            return Err(e);
        }

        Ok(MergeReport {
            used,
            skipped,
            duration_ms,
        })
    }

    async fn encode_with_ffmpeg(&self, samples: Vec<f32>, output: &Path) -> Result<(), MergeError> {
        let scratch = tempfile::Builder::new()
            .prefix("bookcast-merge-")
            .suffix(".wav")
            .tempfile()?;
        let wav_path = scratch.path().to_path_buf();

        let settings = self.settings.clone();
        let tmp = wav_path.clone();
        tokio::task::spawn_blocking(move || write_wav(&tmp, &samples, &settings))
            .await
            .map_err(|e| MergeError::Encode(format!("WAV writer panicked: {}", e)))??;

        let args = ffmpeg_args(&self.settings, &wav_path, output);
        debug!("Running ffmpeg {}", args.join(" "));

        let ffmpeg_future = Command::new("ffmpeg").args(&args).output();
        let result = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| MergeError::Encode(format!("Failed to execute ffmpeg: {}", e)))?
            },
            _ = tokio::time::sleep(ENCODE_TIMEOUT) => {
                return Err(MergeError::Encode(format!(
                    "ffmpeg timed out after {} seconds", ENCODE_TIMEOUT.as_secs()
                )));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MergeError::Encode(filter_ffmpeg_stderr(&stderr)));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(MergeError::Encode("ffmpeg produced no output".to_string())),
        }
    }
}

fn ffmpeg_args(settings: &MergeSettings, input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-ar".into(),
        settings.sample_rate.to_string(),
        "-ac".into(),
        settings.channels.to_string(),
    ];
    args.extend(settings.format.codec_args().iter().map(|a| a.to_string()));
    if !settings.format.is_lossless() && !settings.bitrate.is_empty() {
        args.push("-b:a".into());
        args.push(settings.bitrate.clone());
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Decode, normalise and append every readable input
fn concatenate(
    inputs: &[PathBuf],
    settings: &MergeSettings,
) -> Result<(Vec<f32>, usize, usize), MergeError> {
    let mut combined = Vec::new();
    let mut used = 0;
    let mut skipped = 0;

    for path in inputs {
        let audio = match decode_file(path) {
            Ok(audio) => audio,
            Err(e @ (MergeError::MissingAudio(_) | MergeError::UnreadableAudio { .. })) => {
                warn!("Skipping audio input: {}", e);
                skipped += 1;
                continue;
            }
            Err(MergeError::Io(e)) => {
                warn!("Skipping audio input {:?}: {}", path, e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        if audio.samples.is_empty() {
            warn!("Skipping audio input {:?}: no frames", path);
            skipped += 1;
            continue;
        }

        let mixed = remix(audio.samples, audio.channels, settings.channels);
        let resampled = resample(mixed, audio.sample_rate, settings.sample_rate, settings.channels)
            .map_err(|reason| MergeError::UnreadableAudio {
                path: path.clone(),
                reason,
            });
        match resampled {
            Ok(samples) => {
                combined.extend(samples);
                used += 1;
            }
            Err(e) => {
                warn!("Skipping audio input: {}", e);
                skipped += 1;
            }
        }
    }

    Ok((combined, used, skipped))
}

/// Convert interleaved samples between channel counts
pub(crate) fn remix(samples: Vec<f32>, from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from.max(1) as usize, to.max(1) as usize);
    if from == to {
        return samples;
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        if to < from {
            // Downmix: average the source channels into each target channel
            let mean = frame.iter().sum::<f32>() / from as f32;
            out.extend(std::iter::repeat_n(mean, to));
        } else {
            for ch in 0..to {
                out.push(frame[ch % from]);
            }
        }
    }
    out
}

/// Resample interleaved samples with a sinc interpolator
pub(crate) fn resample(
    samples: Vec<f32>,
    from_rate: u32,
    to_rate: u32,
    channels: u16,
) -> Result<Vec<f32>, String> {
    let channels = channels.max(1) as usize;
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }
    if from_rate == 0 {
        return Err("source sample rate is zero".to_string());
    }

    let frames = samples.len() / channels;
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        frames,
        channels,
    )
    .map_err(|e| format!("resampler setup failed: {}", e))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| format!("resampling failed: {}", e))?;

    let out_frames = output.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        for channel in &output {
            interleaved.push(channel[i]);
        }
    }
    Ok(interleaved)
}

fn write_wav(path: &Path, samples: &[f32], settings: &MergeSettings) -> Result<(), MergeError> {
    let spec = hound::WavSpec {
        channels: settings.channels.max(1),
        sample_rate: settings.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_err = |e: hound::Error| MergeError::Encode(format!("WAV encode failed: {}", e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(encode_err)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(encode_err)?;
    }
    writer.finalize().map_err(encode_err)
}

/// Drop ffmpeg banner and stream listing lines, keeping the actual error
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
