// SRF Engine - Release Instance
//
// Per-cell state machine driving spontaneous release: arming after
// excitation, probability gating, sampling, waveform evaluation, retirement
// and drift-triggered re-arming.

mod transitions;
mod population;
mod settings;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::config::{SrfConfig, SrfMode, VarianceConfig};
use crate::core::draws::{EventDraws, UniformSource};
use crate::core::flux::FluxMultipliers;
use crate::core::parameters::DistributionParameters;
use crate::core::resolver::ResolvedParameters;
use crate::core::sampler::{sample_event, SampledEvent};
use crate::core::waveform::Waveform;

pub use transitions::{Transition, TransitionKind, TransitionLog};
pub use population::SrfPopulation;
pub use settings::{
    load_settings, read_settings, EventRecord, SettingsWriter, SETTINGS_COLUMNS, SETTINGS_HEADER,
};

/// Proxy signal above which an event counts as initiated.
pub const ACTIVITY_THRESHOLD: f64 = 0.0002;
/// `Mi` must relax below this before a wait state can re-arm.
pub const MI_REARM_THRESHOLD: f64 = 0.2;
/// Relaxation time constant (ms) of `Mi`.
pub const MI_TAU_MS: f64 = 50.0;

/// Arm state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// Event finished; waiting for `Mi` to relax and SR calcium to drift.
    Retired,
    /// Probability gate failed; waiting for SR calcium to drift.
    NotReady,
    /// Will evaluate the probability gate on the next unexcited step.
    ReadyToArm,
    /// An event is sampled and its waveform is being evaluated.
    Running,
}

impl ArmState {
    /// Integer code written to state traces (-2, -1, 0, 1).
    pub fn code(self) -> i8 {
        match self {
            ArmState::Retired => -2,
            ArmState::NotReady => -1,
            ArmState::ReadyToArm => 0,
            ArmState::Running => 1,
        }
    }

    pub fn is_waiting(self) -> bool {
        matches!(self, ArmState::Retired | ArmState::NotReady)
    }
}

/// Host inputs for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    /// Current simulation time (ms).
    pub time_ms: f64,
    /// Whether the cell is currently excited (action potential).
    pub excited: bool,
    /// Junctional SR calcium (mM).
    pub ca_sr: f64,
}

impl StepInput {
    pub fn new(time_ms: f64, excited: bool, ca_sr: f64) -> Self {
        Self {
            time_ms,
            excited,
            ca_sr,
        }
    }
}

/// Where event parameters come from.
#[derive(Debug, Clone)]
enum Driver {
    /// Sampled from a shared parameter set.
    Stochastic {
        params: Arc<DistributionParameters>,
        mode: SrfMode,
    },
    /// Replayed from a recorded settings line.
    Replay,
}

/// Per-instance settings taken from the configuration.
#[derive(Debug, Clone, Copy)]
struct InstanceSettings {
    variance: VarianceConfig,
    ca_recalc_threshold_mm: f64,
    duration_width_ms: Option<f64>,
    threshold_shift_mm: f64,
}

/// One spontaneous-release instance (a cell or calcium release unit).
///
/// Owns all of its mutable state; only the parameter set is shared.
#[derive(Debug, Clone)]
pub struct SrfInstance {
    cell: usize,
    driver: Driver,
    settings: InstanceSettings,
    state: ArmState,
    t_armed: f64,
    t_initiated: Option<f64>,
    last_time: Option<f64>,
    ca_at_evaluation: f64,
    draws: Option<EventDraws>,
    resolved: Option<ResolvedParameters>,
    event: Option<SampledEvent>,
    waveform: Option<Waveform>,
    duration: f64,
    nryro: f64,
    mi: f64,
    /// Records of initiated events not yet taken by the host, oldest first.
    pending_records: VecDeque<EventRecord>,
    log: TransitionLog,
}

impl SrfInstance {
    /// Creates a sampling instance for `cell`, ready to arm.
    pub fn new(cell: usize, params: Arc<DistributionParameters>, config: &SrfConfig) -> Self {
        let mode = params.key.mode;
        Self::with_driver(
            cell,
            Driver::Stochastic { params, mode },
            InstanceSettings {
                variance: config.variance,
                ca_recalc_threshold_mm: config.ca_recalc_threshold_mm,
                duration_width_ms: config.duration_width_ms,
                threshold_shift_mm: 0.0,
            },
            ArmState::ReadyToArm,
        )
    }

    /// Creates a Read-mode instance replaying `record`.
    pub fn replay(record: &EventRecord) -> Self {
        let mut instance = Self::idle_replay(record.cell);
        instance.state = ArmState::Running;
        instance.waveform = Some(record.waveform());
        instance.duration = record.duration;
        instance
    }

    /// Creates a Read-mode instance with no recorded event.
    pub fn idle_replay(cell: usize) -> Self {
        Self::with_driver(
            cell,
            Driver::Replay,
            InstanceSettings {
                variance: VarianceConfig::default(),
                ca_recalc_threshold_mm: 0.0,
                duration_width_ms: None,
                threshold_shift_mm: 0.0,
            },
            ArmState::Retired,
        )
    }

    fn with_driver(
        cell: usize,
        driver: Driver,
        settings: InstanceSettings,
        state: ArmState,
    ) -> Self {
        Self {
            cell,
            driver,
            settings,
            state,
            t_armed: 0.0,
            t_initiated: None,
            last_time: None,
            ca_at_evaluation: 0.0,
            draws: None,
            resolved: None,
            event: None,
            waveform: None,
            duration: 0.0,
            nryro: 0.0,
            mi: 0.0,
            pending_records: VecDeque::new(),
            log: TransitionLog::disabled(),
        }
    }

    /// Moves this instance's probability threshold by `shift_mm`.
    pub fn with_threshold_shift(mut self, shift_mm: f64) -> Self {
        self.settings.threshold_shift_mm = shift_mm;
        self
    }

    /// Enables transition logging with the given capacity.
    pub fn with_log(mut self, max_events: usize) -> Self {
        self.log = TransitionLog::new(max_events);
        self
    }

    // -----------------------------------------------------------------------
    // Per-step update
    // -----------------------------------------------------------------------

    /// Advances the instance to `input.time_ms` and returns the open-RyR proxy.
    ///
    /// Consumes one uniform per probability evaluation and five more when the
    /// gate passes.
    pub fn step<U: UniformSource + ?Sized>(&mut self, input: StepInput, rng: &mut U) -> f64 {
        let t = input.time_ms;
        let dt = self.last_time.map_or(0.0, |last| (t - last).max(0.0));
        self.last_time = Some(t);

        let mode = match &self.driver {
            Driver::Stochastic { mode, .. } => Some(*mode),
            Driver::Replay => None,
        };

        if let Some(mode) = mode {
            if input.excited {
                self.on_excitation(t);
            } else {
                if self.state.is_waiting()
                    && mode == SrfMode::Dynamic
                    && self.drift_allows_rearm(input.ca_sr)
                {
                    self.log.record(t, TransitionKind::Rearmed { ca_sr: input.ca_sr });
                    self.set_state(t, ArmState::ReadyToArm);
                }
                if self.state == ArmState::ReadyToArm {
                    self.arm(t, input.ca_sr, rng);
                }
            }
        }

        if self.state == ArmState::Running {
            self.evaluate_waveform(t);
        } else if self.state.is_waiting() || input.excited {
            self.nryro = 0.0;
        }

        self.relax_mi(dt);
        self.nryro
    }

    fn on_excitation(&mut self, t: f64) {
        match self.state {
            ArmState::Running => {
                self.nryro = 0.0;
                self.log.record(t, TransitionKind::Cancelled);
                self.set_state(t, ArmState::ReadyToArm);
            }
            ArmState::Retired | ArmState::NotReady => self.set_state(t, ArmState::ReadyToArm),
            ArmState::ReadyToArm => {}
        }
    }

    fn drift_allows_rearm(&self, ca_sr: f64) -> bool {
        self.mi < MI_REARM_THRESHOLD
            && (ca_sr - self.ca_at_evaluation).abs() > self.settings.ca_recalc_threshold_mm
    }

    fn arm<U: UniformSource + ?Sized>(&mut self, t: f64, ca_sr: f64, rng: &mut U) {
        let params = match &self.driver {
            Driver::Stochastic { params, .. } => Arc::clone(params),
            Driver::Replay => return,
        };

        let gate = rng.uniform();
        let probability = params
            .probability
            .evaluate(ca_sr, self.settings.threshold_shift_mm);
        let passed = gate < probability;
        self.ca_at_evaluation = ca_sr;
        self.log.record(
            t,
            TransitionKind::Evaluated {
                ca_sr,
                probability,
                passed,
            },
        );

        if !passed {
            self.set_state(t, ArmState::NotReady);
            return;
        }

        let draws = EventDraws::draw(rng);
        let resolved = params.resolve(ca_sr, self.settings.duration_width_ms);
        let event = sample_event(&resolved, &params.amplitude, &self.settings.variance, &draws);
        self.log.record(
            t,
            TransitionKind::Sampled {
                duration: event.duration,
                peak: event.total_peak(),
                long: event.is_long(),
            },
        );
        tracing::debug!(
            cell = self.cell,
            time_ms = t,
            ca_sr,
            probability,
            duration = event.duration,
            ti = event.start(),
            "sampled spontaneous release event"
        );

        self.t_armed = t;
        self.draws = Some(draws);
        self.resolved = Some(resolved);
        self.waveform = Some(Waveform::from_event(&event, t));
        self.duration = event.duration;
        self.event = Some(event);
        self.t_initiated = None;
        self.set_state(t, ArmState::Running);
    }

    fn evaluate_waveform(&mut self, t: f64) {
        let Some(waveform) = self.waveform else {
            self.nryro = 0.0;
            return;
        };
        let value = waveform.eval(t);
        self.nryro = value;

        match self.t_initiated {
            None if value > ACTIVITY_THRESHOLD => {
                self.t_initiated = Some(t);
                if matches!(self.driver, Driver::Stochastic { .. }) {
                    if let Some(record) = self.event_record(t) {
                        self.pending_records.push_back(record);
                    }
                }
                self.log.record(t, TransitionKind::Initiated);
            }
            None if t > waveform.end => {
                tracing::warn!(
                    cell = self.cell,
                    time_ms = t,
                    "event window closed without initiating"
                );
                self.log.record(t, TransitionKind::Retired { initiated: false });
                self.set_state(t, ArmState::Retired);
            }
            Some(_) if value < ACTIVITY_THRESHOLD => {
                self.log.record(t, TransitionKind::Retired { initiated: true });
                self.set_state(t, ArmState::Retired);
            }
            _ => {}
        }
    }

    fn relax_mi(&mut self, dt: f64) {
        let target = if self.nryro > ACTIVITY_THRESHOLD { 1.0 } else { 0.0 };
        self.mi += (target - self.mi) * (1.0 - (-dt / MI_TAU_MS).exp());
    }

    fn set_state(&mut self, t: f64, to: ArmState) {
        if self.state != to {
            tracing::debug!(
                cell = self.cell,
                time_ms = t,
                from = self.state.code(),
                to = to.code(),
                "arm state transition"
            );
        }
        self.state = to;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn arm_state(&self) -> ArmState {
        self.state
    }

    /// Last evaluated open-RyR proxy.
    pub fn nryro(&self) -> f64 {
        self.nryro
    }

    /// Refractoriness proxy gating drift re-arming.
    pub fn mi(&self) -> f64 {
        self.mi
    }

    pub fn t_armed(&self) -> f64 {
        self.t_armed
    }

    pub fn t_initiated(&self) -> Option<f64> {
        self.t_initiated
    }

    /// True once the current event has crossed the activity threshold.
    pub fn waveform_initiated(&self) -> bool {
        self.t_initiated.is_some()
    }

    pub fn draws(&self) -> Option<&EventDraws> {
        self.draws.as_ref()
    }

    pub fn resolved(&self) -> Option<&ResolvedParameters> {
        self.resolved.as_ref()
    }

    pub fn event(&self) -> Option<&SampledEvent> {
        self.event.as_ref()
    }

    pub fn waveform(&self) -> Option<&Waveform> {
        self.waveform.as_ref()
    }

    pub fn transition_log(&self) -> &TransitionLog {
        &self.log
    }

    /// Elapsed time since initiation as a fraction of the event duration,
    /// capped at 1.0. Zero before initiation.
    pub fn active_proportion(&self, t: f64) -> f64 {
        match self.t_initiated {
            Some(t_init) if self.duration > 0.0 => {
                ((t - t_init) / self.duration).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Flux multipliers for the current proxy signal and event duration.
    pub fn flux_multipliers(&self) -> FluxMultipliers {
        FluxMultipliers::compute(self.nryro, self.duration)
    }

    /// Whether an initiated event's record is waiting to be taken.
    pub fn has_pending_record(&self) -> bool {
        !self.pending_records.is_empty()
    }

    /// Takes the oldest record of an initiated event not yet taken.
    ///
    /// Records are captured at the initiation crossing, so later re-arming or
    /// cancellation does not alter or drop them.
    pub fn take_record(&mut self) -> Option<EventRecord> {
        self.pending_records.pop_front()
    }

    /// Settings record of the current event, initiated at `t_init`.
    fn event_record(&self, t_init: f64) -> Option<EventRecord> {
        let event = self.event?;
        let waveform = self.waveform?;
        let plateau = waveform.plateau;
        Some(EventRecord {
            cell: self.cell,
            duration: event.duration,
            spike_start: self.t_armed + event.ti,
            plateau_start: self.t_armed + event.start(),
            peak: event.peak,
            plateau: plateau.map_or(0.0, |p| p.amplitude),
            peak_time: event.time_to_peak + t_init,
            initiation_marker: event.start() + t_init,
            thalf1: waveform.spike.thalf1,
            thalf2: waveform.spike.thalf2,
            k1: waveform.spike.k1,
            k2: waveform.spike.k2,
            thalf_plateau1: plateau.map_or(0.0, |p| p.thalf1),
            thalf_plateau2: plateau.map_or(0.0, |p| p.thalf2),
            k1_plateau: plateau.map_or(0.0, |p| p.k1),
            k2_plateau: plateau.map_or(0.0, |p| p.k2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ParameterSetName;
    use crate::core::draws::ScriptedDraws;

    fn dynamic_control() -> (Arc<DistributionParameters>, SrfConfig) {
        let config = SrfConfig::from_names("Dynamic", "3D_cell", "Control").unwrap();
        let params = Arc::new(DistributionParameters::from_config(&config).unwrap());
        (params, config)
    }

    fn passing_draws() -> ScriptedDraws {
        // Gate passes, then median draws for the event.
        ScriptedDraws::new(vec![0.1, 0.5, 0.5, 0.5, 0.5, 0.5])
    }

    /// Steps every `dt` ms from `from` to `to` (inclusive), returning the
    /// states seen.
    fn run(
        instance: &mut SrfInstance,
        rng: &mut ScriptedDraws,
        from: f64,
        to: f64,
        dt: f64,
        ca_sr: f64,
    ) -> Vec<ArmState> {
        let mut states = Vec::new();
        let mut t = from;
        while t <= to {
            instance.step(StepInput::new(t, false, ca_sr), rng);
            states.push(instance.arm_state());
            t += dt;
        }
        states
    }

    #[test]
    fn dynamic_scenario_arms_initiates_and_retires() {
        // GIVEN: Dynamic/3D_cell/Control at CaSR = 1.0 mM with a passing gate draw
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config).with_log(64);
        let mut rng = passing_draws();
        assert_eq!(instance.arm_state(), ArmState::ReadyToArm);

        // WHEN: the first unexcited step is taken
        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);

        // THEN: the instance is running after one evaluation and six draws
        assert_eq!(instance.arm_state(), ArmState::Running);
        assert_eq!(rng.consumed(), 6);
        assert!(!instance.waveform_initiated());

        // WHEN: stepping 20 ms at a time
        let mut initiated_at = None;
        let mut retired_at = None;
        let mut t = 20.0;
        while t <= 5000.0 {
            instance.step(StepInput::new(t, false, 1.0), &mut rng);
            if initiated_at.is_none() && instance.waveform_initiated() {
                initiated_at = Some(t);
                assert!(instance.nryro() > ACTIVITY_THRESHOLD);
            }
            if retired_at.is_none() && instance.arm_state() == ArmState::Retired {
                retired_at = Some(t);
                assert!(instance.nryro() < ACTIVITY_THRESHOLD);
            }
            t += 20.0;
        }

        // THEN: the signal initiated, then the instance retired to a wait state
        let initiated_at = initiated_at.expect("event should initiate");
        let retired_at = retired_at.expect("event should retire");
        assert!(retired_at > initiated_at);
        assert!(instance.arm_state().is_waiting());
        assert_eq!(instance.transition_log().initiated_count(), 1);
        // CaSR never drifted, so no further draws were taken.
        assert_eq!(rng.consumed(), 6);
    }

    #[test]
    fn failed_gate_waits_for_calcium_drift() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config);
        // Gate draw 0.99 fails at CaSR = 0.9 (p ~ 0.2).
        let mut rng = ScriptedDraws::new(vec![0.99]);

        instance.step(StepInput::new(0.0, false, 0.9), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::NotReady);
        assert_eq!(rng.consumed(), 1);

        // Drift below the 10 uM threshold: no re-evaluation.
        instance.step(StepInput::new(10.0, false, 0.905), &mut rng);
        assert_eq!(rng.consumed(), 1);

        // Drift beyond it: re-evaluated (and fails again).
        instance.step(StepInput::new(20.0, false, 0.92), &mut rng);
        assert_eq!(rng.consumed(), 2);
        assert_eq!(instance.arm_state(), ArmState::NotReady);
    }

    #[test]
    fn excitation_cancels_running_event() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config).with_log(16);
        let mut rng = passing_draws();
        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::Running);

        let out = instance.step(StepInput::new(10.0, true, 1.0), &mut rng);
        assert_eq!(out, 0.0);
        assert_eq!(instance.arm_state(), ArmState::ReadyToArm);
        assert!(instance
            .transition_log()
            .events()
            .iter()
            .any(|e| e.kind == TransitionKind::Cancelled));

        // Still excited: stays ready without drawing.
        instance.step(StepInput::new(20.0, true, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::ReadyToArm);
        assert_eq!(rng.consumed(), 6);

        // Excitation ends: re-arms immediately.
        instance.step(StepInput::new(30.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::Running);
        assert!((instance.t_armed() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mi_blocks_rearm_right_after_retirement() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config);
        let mut rng = passing_draws();
        let states = run(&mut instance, &mut rng, 0.0, 5000.0, 1.0, 1.0);
        let retired_index = states
            .iter()
            .position(|s| *s == ArmState::Retired)
            .expect("event should retire");
        let retired_time = retired_index as f64;
        assert!(instance.mi() < MI_REARM_THRESHOLD);

        // A fresh instance, stopped right at retirement, still has high Mi.
        let (params, config) = dynamic_control();
        let mut fresh = SrfInstance::new(0, params, &config);
        let mut rng = passing_draws();
        run(&mut fresh, &mut rng, 0.0, retired_time, 1.0, 1.0);
        assert_eq!(fresh.arm_state(), ArmState::Retired);
        assert!(fresh.mi() > MI_REARM_THRESHOLD, "mi = {}", fresh.mi());

        // Large drift right away is not enough while Mi is high.
        fresh.step(StepInput::new(retired_time + 1.0, false, 1.2), &mut rng);
        assert_eq!(fresh.arm_state(), ArmState::Retired);
    }

    #[test]
    fn retired_instance_rearms_after_mi_relaxes_and_calcium_drifts() {
        // GIVEN: an event that retired long ago at a constant CaSR
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config).with_log(64);
        let mut rng = passing_draws();
        run(&mut instance, &mut rng, 0.0, 5000.0, 1.0, 1.0);
        assert_eq!(instance.arm_state(), ArmState::Retired);
        assert!(instance.mi() < MI_REARM_THRESHOLD, "mi = {}", instance.mi());
        assert_eq!(rng.consumed(), 6);

        // WHEN: CaSR drifts by 20 uM
        instance.step(StepInput::new(5001.0, false, 1.02), &mut rng);

        // THEN: the instance re-arms, draws a second gate and fires again
        assert!(instance
            .transition_log()
            .events()
            .iter()
            .any(|e| matches!(e.kind, TransitionKind::Rearmed { .. })));
        assert_eq!(rng.consumed(), 12);
        assert_eq!(instance.arm_state(), ArmState::Running);
        assert!((instance.t_armed() - 5001.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_rearm_keeps_pending_record_intact() {
        // GIVEN: an initiated, retired event whose record was not taken
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config);
        // Six draws for the first event, then a gate draw that fails at 0.9 mM.
        let mut rng = ScriptedDraws::new(vec![0.1, 0.5, 0.5, 0.5, 0.5, 0.5, 0.99]);
        run(&mut instance, &mut rng, 0.0, 5000.0, 1.0, 1.0);
        let event = *instance.event().unwrap();
        assert!(instance.has_pending_record());

        // WHEN: CaSR drifts and the new gate evaluation fails
        instance.step(StepInput::new(5001.0, false, 0.9), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::NotReady);
        assert_eq!(rng.consumed(), 7);

        // THEN: the record still carries the original arming time
        assert_eq!(instance.t_armed(), 0.0);
        let record = instance.take_record().expect("record survives a failed gate");
        assert!(
            (record.spike_start - event.ti).abs() < 1e-9,
            "spike_start {} expected {}",
            record.spike_start,
            event.ti
        );
        assert!((record.plateau_start - event.start()).abs() < 1e-9);
    }

    #[test]
    fn cancelled_event_record_is_not_lost_on_rearm() {
        // GIVEN: an event that has initiated
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(1, params, &config);
        let mut rng = passing_draws();
        let mut t = 0.0;
        while !instance.waveform_initiated() {
            instance.step(StepInput::new(t, false, 1.0), &mut rng);
            t += 1.0;
        }
        let first = *instance.event().unwrap();

        // WHEN: excitation cancels it and the next step arms a new event
        instance.step(StepInput::new(t, true, 1.0), &mut rng);
        instance.step(StepInput::new(t + 1.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::Running);
        assert_eq!(rng.consumed(), 12);

        // THEN: the first event's record is still delivered, unchanged
        let record = instance.take_record().expect("initiated event keeps its record");
        assert!((record.spike_start - first.ti).abs() < 1e-9);
        assert!((record.duration - first.duration).abs() < f64::EPSILON);
        assert!(instance.take_record().is_none());
    }

    #[test]
    fn direct_control_fails_gate_until_next_excitation() {
        let config = SrfConfig::from_names("Direct_Control", "General", "Default").unwrap();
        let params = Arc::new(DistributionParameters::from_config(&config).unwrap());
        let mut instance = SrfInstance::new(0, params, &config);
        let mut rng = ScriptedDraws::new(vec![0.7, 0.3, 0.5, 0.5, 0.5, 0.5, 0.5]);

        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::NotReady);

        // Calcium drift does not re-arm in Direct_Control.
        instance.step(StepInput::new(100.0, false, 2.0), &mut rng);
        assert_eq!(rng.consumed(), 1);

        instance.step(StepInput::new(200.0, true, 2.0), &mut rng);
        instance.step(StepInput::new(210.0, false, 2.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::Running);
        assert_eq!(rng.consumed(), 7);
    }

    #[test]
    fn record_is_emitted_once_per_initiated_event() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(4, params, &config);
        let mut rng = passing_draws();
        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);
        assert!(instance.take_record().is_none());

        run(&mut instance, &mut rng, 1.0, 5000.0, 1.0, 1.0);
        let record = instance.take_record().expect("initiated event has a record");
        assert_eq!(record.cell, 4);
        let event = *instance.event().unwrap();
        assert!((record.duration - event.duration).abs() < f64::EPSILON);
        assert!((record.spike_start - event.ti).abs() < 1e-9);
        assert!(instance.take_record().is_none());
    }

    #[test]
    fn active_proportion_is_capped() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config);
        let mut rng = passing_draws();
        assert_eq!(instance.active_proportion(100.0), 0.0);
        run(&mut instance, &mut rng, 0.0, 5000.0, 5.0, 1.0);
        let t_init = instance.t_initiated().unwrap();
        let duration = instance.event().unwrap().duration;
        let half = instance.active_proportion(t_init + 0.5 * duration);
        assert!((half - 0.5).abs() < 1e-9);
        assert_eq!(instance.active_proportion(t_init + 10.0 * duration), 1.0);
    }

    #[test]
    fn flux_multipliers_follow_signal() {
        let (params, config) = dynamic_control();
        let mut instance = SrfInstance::new(0, params, &config);
        let mut rng = passing_draws();
        assert_eq!(instance.flux_multipliers(), FluxMultipliers::IDENTITY);

        let mut saw_correction = false;
        let mut t = 0.0;
        while t <= 3000.0 {
            instance.step(StepInput::new(t, false, 1.0), &mut rng);
            let m = instance.flux_multipliers();
            if instance.nryro() > 0.002 {
                assert!(m.ncx < 1.0);
                saw_correction = true;
            } else {
                assert_eq!(m, FluxMultipliers::IDENTITY);
            }
            t += 5.0;
        }
        assert!(saw_correction);
    }

    #[test]
    fn threshold_shift_changes_gate_outcome() {
        let (params, config) = dynamic_control();
        // p(1.0) ~ 0.81 unshifted; shifting the threshold up 0.2 mM drops it near 0.
        let mut instance = SrfInstance::new(0, params, &config).with_threshold_shift(0.2);
        let mut rng = ScriptedDraws::new(vec![0.1]);
        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::NotReady);
    }

    #[test]
    fn replay_instance_evaluates_recorded_waveform() {
        // GIVEN: a record produced by a sampling instance
        let (params, config) = dynamic_control();
        let mut source = SrfInstance::new(2, params, &config);
        let mut rng = passing_draws();
        run(&mut source, &mut rng, 0.0, 5000.0, 1.0, 1.0);
        let record = source.take_record().unwrap();
        let expected = *source.waveform().unwrap();

        // WHEN: replaying it, ignoring excitation and calcium
        let mut replay = SrfInstance::replay(&record);
        let mut unused = ScriptedDraws::new(vec![]);
        let t = expected.spike.thalf1;
        let value = replay.step(StepInput::new(t, false, 0.1), &mut unused);

        // THEN: the signal matches the recorded waveform and no draws are taken
        assert!((value - expected.eval(t)).abs() < 1e-9);
        assert_eq!(unused.consumed(), 0);
        assert!(!replay.has_pending_record());
    }

    #[test]
    fn sensitised_set_is_available_for_instances() {
        let params =
            Arc::new(DistributionParameters::cell_3d(ParameterSetName::Sensitised).unwrap());
        let config = SrfConfig::default();
        let mut instance = SrfInstance::new(0, params, &config);
        let mut rng = passing_draws();
        instance.step(StepInput::new(0.0, false, 1.0), &mut rng);
        assert_eq!(instance.arm_state(), ArmState::Running);
    }
}
