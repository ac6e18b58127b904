//! Utility modules for readaloud-assess

pub mod audio_decoder;
#[cfg(test)]
pub(crate) mod http_stub;
pub mod resampler;
pub mod wav;

pub use audio_decoder::{decode_audio_bytes, decode_audio_file, DecodedAudio};
pub use resampler::Resampler;

/// First `max_chars` characters of `text`, for log previews
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
