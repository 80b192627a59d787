//! Vosk-backed implementation of the on-device recognizer seam.

use super::backend::TranscribeError;
use super::on_device::{SpeechRecognizer, WindowResult};
use crate::transcript::RecognizedWord;
use std::path::Path;
use vosk::{Model, Recognizer};

const SAMPLE_RATE: f32 = 16000.0;
const FEED_CHUNK_SAMPLES: usize = 4000;

pub struct VoskRecognizer {
    model: Model,
}

impl VoskRecognizer {
    pub fn new(model_path: &Path) -> Result<Self, TranscribeError> {
        let model = Model::new(model_path.to_string_lossy().into_owned())
            .ok_or(TranscribeError::RecognizerUnavailable)?;
        Ok(Self { model })
    }
}

impl SpeechRecognizer for VoskRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn recognize(
        &self,
        samples: &[i16],
        _language: Option<&str>,
    ) -> Result<WindowResult, TranscribeError> {
        // A fresh recognizer per window; Vosk recognizers carry decoding
        // state across calls otherwise.
        let mut recognizer = Recognizer::new(&self.model, SAMPLE_RATE)
            .ok_or(TranscribeError::RecognizerUnavailable)?;
        recognizer.set_words(true);

        for chunk in samples.chunks(FEED_CHUNK_SAMPLES) {
            let _ = recognizer.accept_waveform(chunk);
        }

        let result = recognizer.final_result();
        let single = result.single().ok_or_else(|| {
            TranscribeError::TranscriptionFailed("recognizer returned no final result".into())
        })?;

        let words = single
            .result
            .iter()
            .map(|w| RecognizedWord::new(w.word, w.start as f64, w.conf))
            .collect();
        Ok(WindowResult {
            words,
            text: single.text.to_string(),
        })
    }
}
