use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    audio::AudioCues,
    sensing::{PresenceObservation, PresenceSource, SamplingConfig, SensingController},
    settings::TimerSettings,
};

use super::session::{Session, SessionEvent};
use super::state::{ClockState, SessionCounters};

/// Everything the front end needs to draw the timer.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session_id: String,
    pub clock: ClockState,
    /// `M:SS`
    pub display: String,
    pub counters: SessionCounters,
    pub work_progress: f64,
    pub break_progress: f64,
    pub color_hint: &'static str,
    /// Whether a camera is wired up at all.
    pub presence_enabled: bool,
}

impl TimerSnapshot {
    fn capture(session: &Session, presence_enabled: bool) -> Self {
        let counters = session.counters();
        Self {
            session_id: session.id().to_string(),
            clock: session.clock_state(),
            display: session.clock().display(),
            counters,
            work_progress: counters.work_progress(),
            break_progress: counters.break_progress(),
            color_hint: session.phase().color_hint(),
            presence_enabled,
        }
    }
}

enum ControlCommand {
    Tick { generation: u64 },
    PersonDetected,
    PersonLeft,
    Pause,
    Reset,
    AdjustDuration(i32),
    Snapshot(oneshot::Sender<TimerSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the task that owns the session.
///
/// All state changes are applied one at a time on that task, so a phase
/// transition can never interleave with a tick or a presence sample. The
/// one-second ticker runs only while the timer is running and presence
/// sampling runs only during work; both are started and stopped after every
/// change.
#[derive(Clone)]
pub struct SessionController {
    tx: mpsc::UnboundedSender<ControlCommand>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl SessionController {
    /// Spawns the control task on the current tokio runtime.
    ///
    /// Without a `presence` source the timer still works, driven only by the
    /// manual actions.
    pub fn spawn(
        settings: &TimerSettings,
        audio: Arc<dyn AudioCues>,
        presence: Option<PresenceSource>,
    ) -> Self {
        let session = Session::new(settings.durations());
        let (tx, rx) = mpsc::unbounded_channel();
        let (observation_tx, observation_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) =
            watch::channel(TimerSnapshot::capture(&session, presence.is_some()));

        if presence.is_none() {
            warn!("no presence source, running as a manual timer");
        }

        let control = ControlLoop {
            session,
            commands: rx,
            command_tx: tx.downgrade(),
            observations: observation_rx,
            observation_tx,
            ticker: None,
            ticker_generation: 0,
            tick_interval: settings.tick_interval(),
            sensing: SensingController::new(),
            sampling: settings.sampling(),
            presence,
            audio,
            ambient_playing: false,
            snapshots: snapshot_tx,
        };
        tokio::spawn(control.run());

        Self {
            tx,
            snapshots: snapshot_rx,
        }
    }

    pub fn on_person_detected(&self) -> Result<()> {
        self.send(ControlCommand::PersonDetected)
    }

    pub fn on_person_left(&self) -> Result<()> {
        self.send(ControlCommand::PersonLeft)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(ControlCommand::Pause)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(ControlCommand::Reset)
    }

    pub fn adjust_duration(&self, delta: i32) -> Result<()> {
        self.send(ControlCommand::AdjustDuration(delta))
    }

    /// Current state, after every command sent before this call was applied.
    pub async fn get_snapshot(&self) -> Result<TimerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(ControlCommand::Snapshot(reply))?;
        response
            .await
            .map_err(|_| anyhow!("session controller dropped the snapshot request"))
    }

    /// Receives a new snapshot whenever the visible state changes.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the ticker, presence sampling and audio, then ends the task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.send(ControlCommand::Shutdown(reply))?;
        done.await
            .map_err(|_| anyhow!("session controller exited before acknowledging shutdown"))
    }

    fn send(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("session controller is no longer running"))
    }
}

struct ControlLoop {
    session: Session,
    commands: mpsc::UnboundedReceiver<ControlCommand>,
    /// Weak so the loop ends once every handle is dropped.
    command_tx: mpsc::WeakUnboundedSender<ControlCommand>,
    observations: mpsc::UnboundedReceiver<PresenceObservation>,
    observation_tx: mpsc::UnboundedSender<PresenceObservation>,
    ticker: Option<JoinHandle<()>>,
    /// Ticks from a cancelled ticker carry a stale generation and are dropped.
    ticker_generation: u64,
    tick_interval: Duration,
    sensing: SensingController,
    sampling: SamplingConfig,
    presence: Option<PresenceSource>,
    audio: Arc<dyn AudioCues>,
    ambient_playing: bool,
    snapshots: watch::Sender<TimerSnapshot>,
}

impl ControlLoop {
    async fn run(mut self) {
        info!("session {} ready at {}", self.session.id(), self.session.clock().display());
        self.reconcile().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all session handles dropped");
                        break;
                    };
                    match command {
                        ControlCommand::Shutdown(done) => {
                            self.stop_everything().await;
                            let _ = done.send(());
                            return;
                        }
                        command => self.handle(command),
                    }
                }
                Some(observation) = self.observations.recv() => {
                    let event = self.session.observe(observation.person_present);
                    self.after(event);
                }
            }

            self.reconcile().await;
            self.publish();
        }

        self.stop_everything().await;
    }

    fn handle(&mut self, command: ControlCommand) {
        let event = match command {
            ControlCommand::Tick { generation } => {
                if generation != self.ticker_generation {
                    return;
                }
                self.session.tick()
            }
            ControlCommand::PersonDetected => self.session.on_person_detected(),
            ControlCommand::PersonLeft => self.session.on_person_left(),
            ControlCommand::Pause => self.session.pause(),
            ControlCommand::Reset => Some(self.session.reset()),
            ControlCommand::AdjustDuration(delta) => self.session.adjust_duration(delta),
            ControlCommand::Snapshot(reply) => {
                let _ = reply.send(TimerSnapshot::capture(
                    &self.session,
                    self.presence.is_some(),
                ));
                None
            }
            ControlCommand::Shutdown(_) => None,
        };
        self.after(event);
    }

    fn after(&mut self, event: Option<SessionEvent>) {
        if let Some(SessionEvent::PhaseCompleted { completed, .. }) = event {
            if let Err(err) = self.audio.play_once() {
                warn!("{} completion cue failed: {err}", completed.as_str());
            }
        }
    }

    /// Brings the ticker, sampling and ambient sound in line with the session.
    async fn reconcile(&mut self) {
        match (self.session.wants_ticker(), self.ticker.is_some()) {
            (true, false) => self.start_ticker(),
            (false, true) => self.stop_ticker(),
            _ => {}
        }

        if let Some(source) = &self.presence {
            match (self.session.wants_presence(), self.sensing.is_active()) {
                (true, false) => {
                    if let Err(err) = self.sensing.start_sensing(
                        source.clone(),
                        self.observation_tx.clone(),
                        self.sampling,
                    ) {
                        error!("failed to start presence sampling: {err:?}");
                    }
                }
                (false, true) => {
                    if let Err(err) = self.sensing.stop_sensing().await {
                        error!("failed to stop presence sampling: {err:?}");
                    }
                    // Anything sampled before the stop belongs to the old phase
                    while self.observations.try_recv().is_ok() {}
                }
                _ => {}
            }
        }

        let wants_ambient = self.session.wants_ambient();
        if wants_ambient != self.ambient_playing {
            let result = if wants_ambient {
                self.audio.play_loop()
            } else {
                self.audio.stop_loop()
            };
            if let Err(err) = result {
                warn!("ambient cue failed: {err}");
            }
            self.ambient_playing = wants_ambient;
        }
    }

    fn start_ticker(&mut self) {
        let Some(tx) = self.command_tx.upgrade() else {
            return;
        };
        self.ticker_generation = self.ticker_generation.wrapping_add(1);
        let generation = self.ticker_generation;
        let period = self.tick_interval;
        let tx = tx.downgrade();

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(tx) = tx.upgrade() else {
                    break;
                };
                if tx.send(ControlCommand::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        self.ticker_generation = self.ticker_generation.wrapping_add(1);
    }

    async fn stop_everything(&mut self) {
        self.stop_ticker();
        if let Err(err) = self.sensing.stop_sensing().await {
            error!("failed to stop presence sampling: {err:?}");
        }
        if self.ambient_playing {
            if let Err(err) = self.audio.stop_loop() {
                warn!("ambient cue failed: {err}");
            }
            self.ambient_playing = false;
        }
        info!("session {} controller stopped", self.session.id());
    }

    fn publish(&self) {
        let snapshot = TimerSnapshot::capture(&self.session, self.presence.is_some());
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{FrameSource, ModelSlot, ObjectDetector, SimulatedPresence};
    use crate::timer::Phase;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Cue {
        LoopOn,
        LoopOff,
        Bell,
    }

    #[derive(Default)]
    struct RecordingAudio {
        cues: Mutex<Vec<Cue>>,
    }

    impl RecordingAudio {
        fn cues(&self) -> Vec<Cue> {
            self.cues.lock().unwrap().clone()
        }

        fn push(&self, cue: Cue) -> Result<(), String> {
            self.cues.lock().unwrap().push(cue);
            Ok(())
        }
    }

    impl AudioCues for RecordingAudio {
        fn play_loop(&self) -> Result<(), String> {
            self.push(Cue::LoopOn)
        }

        fn stop_loop(&self) -> Result<(), String> {
            self.push(Cue::LoopOff)
        }

        fn play_once(&self) -> Result<(), String> {
            self.push(Cue::Bell)
        }
    }

    fn manual(audio: Arc<RecordingAudio>) -> SessionController {
        SessionController::spawn(&TimerSettings::default(), audio, None)
    }

    fn with_sensor(sensor: &Arc<SimulatedPresence>) -> SessionController {
        let source = PresenceSource::new(
            Arc::clone(sensor) as Arc<dyn FrameSource>,
            ModelSlot::loaded(Arc::clone(sensor) as Arc<dyn ObjectDetector>),
        );
        SessionController::spawn(
            &TimerSettings::default(),
            Arc::new(RecordingAudio::default()),
            Some(source),
        )
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_started() {
        let audio = Arc::new(RecordingAudio::default());
        let controller = manual(Arc::clone(&audio));

        controller.on_person_detected().unwrap();
        sleep_ms(3_500).await;

        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.display, "24:57");
        assert!(snapshot.clock.running);
        assert_eq!(snapshot.color_hint, "#333");
        assert_eq!(audio.cues(), vec![Cue::LoopOn]);

        controller.shutdown().await.unwrap();
        assert_eq!(audio.cues(), vec![Cue::LoopOn, Cue::LoopOff]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_ticker() {
        let controller = manual(Arc::new(RecordingAudio::default()));
        controller.on_person_detected().unwrap();
        sleep_ms(2_500).await;
        controller.pause().unwrap();
        sleep_ms(10_000).await;

        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.display, "24:58");
        assert!(!snapshot.clock.running);
    }

    #[tokio::test(start_paused = true)]
    async fn work_phase_expires_into_break_with_a_bell() {
        let audio = Arc::new(RecordingAudio::default());
        let controller = manual(Arc::clone(&audio));
        controller.on_person_detected().unwrap();

        sleep_ms(1_501 * 1_000 + 500).await;

        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.clock.phase, Phase::Break);
        assert_eq!(snapshot.display, "5:00");
        assert!(snapshot.clock.running);
        assert_eq!(snapshot.counters.work_intervals_completed, 1);
        assert_eq!(snapshot.color_hint, "#2196f3");
        assert_eq!(audio.cues(), vec![Cue::LoopOn, Cue::Bell, Cue::LoopOff]);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_mid_work_restarts_from_the_top() {
        let controller = manual(Arc::new(RecordingAudio::default()));
        controller.on_person_detected().unwrap();
        sleep_ms(870_500).await;
        assert_eq!(controller.get_snapshot().await.unwrap().display, "10:30");

        controller.on_person_left().unwrap();
        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.display, "25:00");
        assert!(!snapshot.clock.running);
        assert_eq!(snapshot.clock.phase, Phase::Work);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_actions_work_without_presence() {
        let controller = manual(Arc::new(RecordingAudio::default()));
        controller.adjust_duration(-1).unwrap();
        controller.adjust_duration(-1).unwrap();
        assert_eq!(controller.get_snapshot().await.unwrap().display, "23:00");

        controller.reset().unwrap();
        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.display, "25:00");
        assert!(!snapshot.presence_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn presence_drives_run_and_restart() {
        let sensor = SimulatedPresence::new(false);
        let controller = with_sensor(&sensor);

        sleep_ms(2_000).await;
        assert!(!controller.get_snapshot().await.unwrap().clock.running);

        sensor.set_present(true);
        sleep_ms(5_200).await;
        let snapshot = controller.get_snapshot().await.unwrap();
        assert!(snapshot.clock.running);
        assert!(snapshot.presence_enabled);
        assert_ne!(snapshot.display, "25:00");

        sensor.set_present(false);
        sleep_ms(1_000).await;
        let snapshot = controller.get_snapshot().await.unwrap();
        assert!(!snapshot.clock.running);
        assert_eq!(snapshot.display, "25:00");

        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn absence_is_ignored_during_break() {
        let sensor = SimulatedPresence::new(true);
        let controller = with_sensor(&sensor);

        // First sample lands immediately; the work phase then runs 1501 ticks.
        sleep_ms(1_501 * 1_000 + 700).await;
        assert_eq!(
            controller.get_snapshot().await.unwrap().clock.phase,
            Phase::Break
        );

        sensor.set_present(false);
        sleep_ms(120_000).await;
        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.clock.phase, Phase::Break);
        assert!(snapshot.clock.running);
        assert!(snapshot.display.starts_with("2:") || snapshot.display.starts_with("3:"));

        // Back to work after the break: nobody there, so it waits at the top.
        sleep_ms(200_000).await;
        let snapshot = controller.get_snapshot().await.unwrap();
        assert_eq!(snapshot.clock.phase, Phase::Work);
        assert!(!snapshot.clock.running);
        assert_eq!(snapshot.display, "25:00");
        assert_eq!(snapshot.counters.work_intervals_completed, 1);
        assert_eq!(snapshot.counters.break_intervals_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_changes() {
        let controller = manual(Arc::new(RecordingAudio::default()));
        let mut updates = controller.subscribe();
        assert_eq!(updates.borrow().display, "25:00");

        controller.adjust_duration(1).unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().display, "26:00");
    }

    #[tokio::test(start_paused = true)]
    async fn commands_fail_after_shutdown() {
        let controller = manual(Arc::new(RecordingAudio::default()));
        controller.shutdown().await.unwrap();
        sleep_ms(10).await;
        assert!(controller.pause().is_err());
        assert!(controller.get_snapshot().await.is_err());
    }
}
