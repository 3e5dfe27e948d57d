pub mod bell;
pub mod clock_tick;

use bell::Bell;
use clock_tick::ClockTick;

use log::warn;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::settings::AudioSettings;

/// Sound cues the session controller triggers.
///
/// `play_loop`/`stop_loop` bracket the ambient ticking heard while working;
/// `play_once` rings when a phase completes.
pub trait AudioCues: Send + Sync {
    fn play_loop(&self) -> Result<(), String>;
    fn stop_loop(&self) -> Result<(), String>;
    fn play_once(&self) -> Result<(), String>;
}

/// Cues that make no sound, for `--mute` and for machines without audio.
pub struct SilentAudio;

impl AudioCues for SilentAudio {
    fn play_loop(&self) -> Result<(), String> {
        Ok(())
    }

    fn stop_loop(&self) -> Result<(), String> {
        Ok(())
    }

    fn play_once(&self) -> Result<(), String> {
        Ok(())
    }
}

enum AudioCommand {
    StartLoop,
    StopLoop,
    Bell,
}

pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    settings: AudioSettings,
}

impl AudioEngineHandle {
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            settings,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        self.sender_or_spawn(|| spawn_engine(&self.settings))
    }

    /// Returns the running engine's sender, spawning it on first use.
    ///
    /// The lock is held across the check and the spawn so concurrent callers
    /// share one engine thread.
    fn sender_or_spawn<F>(&self, spawn: F) -> Result<Sender<AudioCommand>, String>
    where
        F: FnOnce() -> Result<Sender<AudioCommand>, String>,
    {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }
        let tx = spawn()?;
        *guard = Some(tx.clone());
        Ok(tx)
    }
}

fn spawn_engine(settings: &AudioSettings) -> Result<Sender<AudioCommand>, String> {
    let (tx, rx) = mpsc::channel::<AudioCommand>();
    let loop_volume = settings.loop_volume.clamp(0.0, 1.0);
    let bell_volume = settings.bell_volume.clamp(0.0, 1.0);

    // Spawn dedicated audio thread holding non-Send audio objects
    thread::Builder::new()
        .name("audio-engine".to_string())
        .spawn(move || {
            let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
            let mut loop_sink: Option<Sink> = None;

            fn new_sink(
                output: &mut Option<(OutputStream, OutputStreamHandle)>,
                volume: f32,
            ) -> Result<Sink, String> {
                if output.is_none() {
                    let opened = OutputStream::try_default()
                        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                    *output = Some(opened);
                }
                let (_, handle) = output
                    .as_ref()
                    .ok_or_else(|| "audio output unavailable".to_string())?;
                let sink = Sink::try_new(handle)
                    .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                sink.set_volume(volume);
                Ok(sink)
            }

            while let Ok(cmd) = rx.recv() {
                match cmd {
                    AudioCommand::StartLoop => {
                        if loop_sink.is_some() {
                            continue;
                        }
                        match new_sink(&mut output, loop_volume) {
                            Ok(sink) => {
                                sink.append(ClockTick::new());
                                loop_sink = Some(sink);
                            }
                            Err(err) => warn!("ambient loop unavailable: {err}"),
                        }
                    }
                    AudioCommand::StopLoop => {
                        if let Some(sink) = loop_sink.take() {
                            sink.stop();
                        }
                    }
                    AudioCommand::Bell => match new_sink(&mut output, bell_volume) {
                        Ok(sink) => {
                            sink.append(Bell::new());
                            sink.detach();
                        }
                        Err(err) => warn!("bell unavailable: {err}"),
                    },
                }
            }
        })
        .map_err(|e| e.to_string())?;

    Ok(tx)
}

impl AudioCues for AudioEngineHandle {
    fn play_loop(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::StartLoop).map_err(|e| e.to_string())
    }

    fn stop_loop(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::StopLoop);
        }
        Ok(())
    }

    fn play_once(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Bell).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn concurrent_callers_share_one_engine() {
        let handle = Arc::new(AudioEngineHandle::new(AudioSettings::default()));
        let spawned = Arc::new(AtomicUsize::new(0));
        let (tx, _rx) = mpsc::channel::<AudioCommand>();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let spawned = Arc::clone(&spawned);
                let tx = tx.clone();
                thread::spawn(move || {
                    handle
                        .sender_or_spawn(|| {
                            spawned.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(tx)
                        })
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(spawned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopping_before_anything_played_spawns_nothing() {
        let handle = AudioEngineHandle::new(AudioSettings::default());
        assert!(handle.stop_loop().is_ok());
        assert!(handle.tx.lock().unwrap().is_none());
    }
}
