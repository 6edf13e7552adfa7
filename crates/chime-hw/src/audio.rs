//! Audio clip playback via rodio.
//!
//! Playback is exclusive: starting a new clip cuts off whatever is
//! still playing. Clips are decoded from their container format (mp3,
//! wav, ogg) straight out of the stored bytes.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    NoDevice(String),
    #[error("clip decode failed: {0}")]
    DecodeFailed(String),
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
}

/// Handle to the default audio output device.
///
/// Not `Send` (the underlying output stream is tied to the thread that
/// created it) — construct it on the dispatch loop's thread.
pub struct Speaker {
    // Kept alive for the lifetime of the speaker; dropping it kills
    // the output stream.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    current: Option<Sink>,
}

impl Speaker {
    /// Open the default output device.
    pub fn open() -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::NoDevice(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            current: None,
        })
    }

    /// Decode and play a clip, cutting off any clip still playing.
    /// Returns as soon as playback has started.
    pub fn play(&mut self, clip: &[u8]) -> Result<(), AudioError> {
        if let Some(prev) = self.current.take() {
            prev.stop();
        }

        let source = Decoder::new(Cursor::new(clip.to_vec()))
            .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;
        let sink =
            Sink::try_new(&self.handle).map_err(|e| AudioError::PlaybackFailed(e.to_string()))?;
        sink.append(source);
        sink.play();
        self.current = Some(sink);

        Ok(())
    }
}
