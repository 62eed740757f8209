//! Song playback through the default audio output.
//!
//! One `OutputStream` lives for the whole session; every request gets a fresh
//! `Sink` so stopping a song never leaves stale samples queued behind the
//! next one.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use discolink_lib::playback::{AudioError, AudioVoice};

pub(crate) struct RodioVoice {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioVoice {
    pub(crate) fn open() -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::Output(format!("stream: {e}")))?;
        Ok(RodioVoice {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

impl AudioVoice for RodioVoice {
    fn play(&mut self, path: &Path, level: f32) -> Result<(), AudioError> {
        self.stop();
        let file = File::open(path)?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| AudioError::Decode(format!("{}: {e}", path.display())))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::Output(format!("sink: {e}")))?;
        sink.set_volume(level);
        sink.append(source);
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.empty())
    }
}
