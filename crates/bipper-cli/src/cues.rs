//! Cue backends for the terminal.
//!
//! Each cue runs on its own [`CueDispatcher`] thread. Without the `audio`
//! feature both cues ring the terminal bell.

use std::io::Write;

use bipper_core::error::CueError;
use bipper_core::storage::CueConfig;
use bipper_core::{CueDispatcher, CuePlayer, CuePort, SilentCue};

/// Rings the terminal bell on stderr.
#[derive(Debug, Default)]
pub struct BellPlayer;

impl CuePlayer for BellPlayer {
    fn play(&mut self) -> Result<(), CueError> {
        let mut err = std::io::stderr().lock();
        err.write_all(b"\x07")
            .and_then(|()| err.flush())
            .map_err(|e| CueError::Playback(e.to_string()))
    }
}

/// Plays a sound file through the default output device.
#[cfg(feature = "audio")]
pub struct SoundFilePlayer {
    bytes: std::sync::Arc<[u8]>,
    // The stream must outlive every sink created from its handle.
    _stream: rodio::OutputStream,
    handle: rodio::OutputStreamHandle,
}

#[cfg(feature = "audio")]
impl SoundFilePlayer {
    pub fn open(path: &str) -> Result<Self, CueError> {
        let bytes = std::fs::read(path)
            .map_err(|e| CueError::Unavailable(format!("cannot read {path}: {e}")))?;
        // Decode once up front so a bad file is reported before the run starts.
        rodio::Decoder::new(std::io::Cursor::new(bytes.clone()))
            .map_err(|e| CueError::Unavailable(format!("cannot decode {path}: {e}")))?;
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| CueError::Unavailable(e.to_string()))?;
        Ok(Self {
            bytes: bytes.into(),
            _stream: stream,
            handle,
        })
    }
}

#[cfg(feature = "audio")]
impl CuePlayer for SoundFilePlayer {
    fn play(&mut self) -> Result<(), CueError> {
        let source = rodio::Decoder::new(std::io::Cursor::new(self.bytes.clone()))
            .map_err(|e| CueError::Playback(e.to_string()))?;
        let sink = rodio::Sink::try_new(&self.handle)
            .map_err(|e| CueError::Playback(e.to_string()))?;
        sink.append(source);
        // Overlapping cues mix instead of queueing behind each other.
        sink.detach();
        Ok(())
    }
}

fn dispatcher(name: &str, sound: &str) -> Result<Box<dyn CuePort>, CueError> {
    if sound.is_empty() {
        return Ok(Box::new(CueDispatcher::spawn(name, || Ok(BellPlayer))?));
    }
    Ok(Box::new(sound_dispatcher(name, sound)?))
}

#[cfg(feature = "audio")]
fn sound_dispatcher(name: &str, sound: &str) -> Result<CueDispatcher, CueError> {
    let path = sound.to_string();
    CueDispatcher::spawn(name, move || SoundFilePlayer::open(&path))
}

#[cfg(not(feature = "audio"))]
fn sound_dispatcher(name: &str, sound: &str) -> Result<CueDispatcher, CueError> {
    tracing::warn!(
        cue = name,
        sound,
        "built without the `audio` feature, using the terminal bell"
    );
    CueDispatcher::spawn(name, || Ok(BellPlayer))
}

/// Build the warning and end cues.
///
/// # Errors
///
/// Returns an error if a cue worker thread cannot be started.
pub fn build(
    config: &CueConfig,
    silent: bool,
) -> Result<(Box<dyn CuePort>, Box<dyn CuePort>), CueError> {
    if silent || !config.enabled {
        tracing::debug!("cues disabled");
        return Ok((Box::new(SilentCue), Box::new(SilentCue)));
    }
    let warning = dispatcher("warning", &config.warning_sound)?;
    let end = dispatcher("end", &config.end_sound)?;
    Ok((warning, end))
}
