/*!
 * Audio decoding, probing and merging.
 *
 * - `decode`: file to interleaved f32 PCM (hound for WAV, symphonia otherwise)
 * - `merge`: concatenate paragraph audio into one segment file
 */

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod decode;
pub mod merge;

pub use decode::{decode_file, probe_duration_ms, DecodedAudio};
pub use merge::{AudioMerger, MergeReport, MergeSettings};

/// Output container of merged segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
    M4a,
    Ogg,
    Opus,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Wav | Self::Flac)
    }

    /// ffmpeg codec arguments for this container
    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            Self::Mp3 => &["-c:a", "libmp3lame"],
            Self::Wav => &["-c:a", "pcm_s16le"],
            Self::Flac => &["-c:a", "flac", "-sample_fmt", "s16"],
            Self::M4a => &["-c:a", "aac"],
            Self::Ogg => &["-c:a", "libvorbis"],
            Self::Opus => &["-c:a", "libopus"],
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches('.') {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            "m4a" | "aac" => Ok(Self::M4a),
            "ogg" => Ok(Self::Ogg),
            "opus" => Ok(Self::Opus),
            other => Err(anyhow!("Unsupported audio format: {}", other)),
        }
    }
}
