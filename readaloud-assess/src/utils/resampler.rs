//! Audio resampling using rubato
//!
//! Mono only: every signal in this crate is mixed down before it gets here.
//! Used to bring recordings to the scoring service's 16 kHz and to bring
//! narration segments to one common output rate before concatenation.

use crate::error::{AssessError, AssessResult};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from `input_rate` to `output_rate`.
    ///
    /// If the rates already match, returns a copy without resampling.
    pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> AssessResult<Vec<f32>> {
        if input_rate == 0 || output_rate == 0 {
            return Err(AssessError::AudioFormat(format!(
                "Invalid sample rate conversion {}Hz -> {}Hz",
                input_rate, output_rate
            )));
        }

        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }

        debug!("Resampling from {}Hz to {}Hz", input_rate, output_rate);

        // Whole clip processed as a single chunk
        let input_frames = input.len();
        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Septic,
            input_frames,
            1,
        )
        .map_err(|e| AssessError::AudioFormat(format!("Failed to create resampler: {}", e)))?;

        let planar_input = vec![input.to_vec()];
        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| AssessError::AudioFormat(format!("Resampling failed: {}", e)))?;

        let output = planar_output.pop().unwrap_or_default();

        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames,
            output.len()
        );

        Ok(output)
    }
}
