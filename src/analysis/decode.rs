//! Container decoding into planar f32 samples, and 16-bit WAV re-encoding.

use crate::error::Failure;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded PCM, one `Vec` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Interleaved 16-bit PCM in a canonical 44-byte-header WAV.
    pub fn to_wav(&self) -> Vec<u8> {
        let channels = self.channels.len().max(1) as u16;
        let frames = self.frames();
        let data_len = (frames * usize::from(channels) * 2) as u32;
        let byte_rate = self.sample_rate * u32::from(channels) * 2;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());

        for i in 0..frames {
            for ch in &self.channels {
                let s = ch.get(i).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
                let v = (if s < 0.0 { s * 32768.0 } else { s * 32767.0 }) as i16;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }
}

/// Decode any container/codec pair symphonia's default registry knows.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio, Failure> {
    let source = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(Failure::malformed)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Failure::Malformed("no audio track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(Failure::malformed)?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Failure::malformed(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt packet is skipped, not fatal.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(Failure::malformed(e)),
        };

        let spec = *decoded.spec();
        let n = spec.channels.count().max(1);
        sample_rate = spec.rate;
        if channels.len() != n {
            channels.resize_with(n, Vec::new);
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks(n) {
            for (ch, s) in channels.iter_mut().zip(frame) {
                ch.push(*s);
            }
        }
    }

    if channels.iter().all(Vec::is_empty) {
        return Err(Failure::Malformed("no samples decoded".into()));
    }
    Ok(DecodedAudio {
        channels,
        sample_rate,
    })
}
