//! Sound cues requested by the engine.
//!
//! The engine does not own an audio device. It calls an [`AudioSink`]
//! handed to it at construction; the host decides what each cue sounds like.

use std::sync::{Arc, Mutex};

/// A sound the presentation layer should play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    /// A bubble left the shooter.
    Launch,
    /// A bubble popped off the grid.
    Pop,
    /// A shot stuck without making a match.
    Plop,
}

/// Receives cues from the engine.
pub trait AudioSink: Send + Sync {
    fn play(&mut self, cue: AudioCue);
}

/// Discards every cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl AudioSink for Silent {
    fn play(&mut self, _cue: AudioCue) {}
}

/// Records cues in order. Clones share the same log, so a host can keep one
/// handle and give the other to the engine.
#[derive(Debug, Default, Clone)]
pub struct CueLog {
    cues: Arc<Mutex<Vec<AudioCue>>>,
}

impl CueLog {
    /// Everything played so far.
    pub fn cues(&self) -> Vec<AudioCue> {
        self.cues.lock().map(|cues| cues.clone()).unwrap_or_default()
    }

    pub fn count(&self, cue: AudioCue) -> usize {
        self.cues().iter().filter(|c| **c == cue).count()
    }

    /// Take everything played so far, leaving the log empty.
    pub fn drain(&self) -> Vec<AudioCue> {
        self.cues
            .lock()
            .map(|mut cues| std::mem::take(&mut *cues))
            .unwrap_or_default()
    }
}

impl AudioSink for CueLog {
    fn play(&mut self, cue: AudioCue) {
        if let Ok(mut cues) = self.cues.lock() {
            cues.push(cue);
        }
    }
}
