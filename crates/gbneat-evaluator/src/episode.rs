//! The episode loop: one emulator, one controller, one accumulated fitness.
//!
//! ```text
//! Init ──init()──▶ Running ──step()*──▶ Terminal(reason)
//! ```
//!
//! Each step advances a frame, snapshots the game, feeds the observation to the
//! controller, presses the chosen button, waits `wait_for_action` frames, snapshots
//! again and adds the policy's reward for that transition. The episode ends on game
//! over, after `stall_limit` consecutive steps without reward, or when the emulator
//! stops. [`EpisodeRunner::run`] stops the emulator on every exit path.

use std::fmt;

use gbneat_engine::{
    Emulator, EmulatorError, FrameHistory, RingBuffer, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    action::Action,
    policy::{GamePolicy, normalize_action},
};

/// Failure reported by a controller (usually a network activation).
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("controller failed: {message}")]
pub struct ControllerError {
    message: String,
}

impl ControllerError {
    pub fn new<M>(message: M) -> Self
    where
        M: fmt::Display,
    {
        Self {
            message: message.to_string(),
        }
    }
}

/// Maps an observation to one score per action.
pub trait Controller {
    fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, ControllerError>;
}

impl<F> Controller for F
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, ControllerError>,
{
    fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, ControllerError> {
        self(inputs)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum EpisodeError {
    #[display("{_0}")]
    Emulator(EmulatorError),
    #[display("{_0}")]
    Controller(ControllerError),
    #[display("controller returned {actual} outputs, expected {expected}")]
    #[from(ignore)]
    OutputLength { expected: usize, actual: usize },
    #[display("operation not allowed in episode state {state}")]
    #[from(ignore)]
    InvalidState { state: EpisodeState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EpisodeConfig {
    /// Frames advanced after each button press.
    pub wait_for_action: u32,
    /// Consecutive rewardless steps after which the episode ends.
    pub stall_limit: u32,
    /// Emulation speed multiplier, `0` for unthrottled.
    pub emulation_speed: u32,
    /// Number of recent actions fed back into the observation.
    pub history_len: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            wait_for_action: 1,
            stall_limit: 2000,
            emulation_speed: 10,
            history_len: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalReason {
    #[display("game over")]
    GameOver,
    #[display("stalled")]
    Stalled,
    #[display("emulator stopped")]
    EmulatorStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum EpisodeState {
    #[display("init")]
    Init,
    #[display("running")]
    Running,
    #[display("terminal ({_0})")]
    Terminal(TerminalReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    pub fitness: f64,
    pub steps: u64,
    pub reason: TerminalReason,
    pub actions: Vec<Action>,
}

/// Index of the highest output. Ties go to the lowest index.
#[must_use]
pub fn select_action(outputs: &[f64]) -> Option<usize> {
    let (first, rest) = outputs.split_first()?;
    let mut best = (0, *first);
    for (i, &value) in rest.iter().enumerate() {
        if value > best.1 {
            best = (i + 1, value);
        }
    }
    Some(best.0)
}

#[derive(Debug)]
pub struct EpisodeRunner<E, P, C>
where
    P: GamePolicy,
{
    emulator: E,
    policy: P,
    controller: C,
    config: EpisodeConfig,
    state: EpisodeState,
    total_reward: f64,
    steps: u64,
    steps_without_reward: u32,
    recent_actions: RingBuffer<usize>,
    frames: FrameHistory,
    actions: Vec<Action>,
    observation: Vec<f64>,
}

impl<E, P, C> EpisodeRunner<E, P, C>
where
    E: Emulator,
    P: GamePolicy,
    C: Controller,
{
    /// Creates a runner whose recent-action history starts with random actions.
    pub fn new<R>(
        emulator: E,
        policy: P,
        controller: C,
        config: EpisodeConfig,
        rng: &mut R,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let action_count = policy.actions().len();
        let recent_actions = RingBuffer::filled(
            config.history_len,
            (0..config.history_len).map(|_| rng.random_range(0..action_count)),
        );
        let scale = policy.frame_scale();
        let frames = FrameHistory::new(
            SCREEN_WIDTH / scale,
            SCREEN_HEIGHT / scale,
            policy.frame_history(),
        );
        let observation = Vec::with_capacity(policy.observation_len(config.history_len));
        Self {
            emulator,
            policy,
            controller,
            config,
            state: EpisodeState::Init,
            total_reward: 0.0,
            steps: 0,
            steps_without_reward: 0,
            recent_actions,
            frames,
            actions: vec![],
            observation,
        }
    }

    #[must_use]
    pub fn state(&self) -> EpisodeState {
        self.state
    }

    #[must_use]
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn recent_actions(&self) -> &RingBuffer<usize> {
        &self.recent_actions
    }

    /// Restores `save_state` (or plays the intro script without one) and applies
    /// the emulation speed.
    pub fn init(&mut self, save_state: Option<&[u8]>) -> Result<(), EpisodeError> {
        if !self.state.is_init() {
            return Err(EpisodeError::InvalidState { state: self.state });
        }
        if let Some(state) = save_state {
            self.emulator.load_state(state)?;
        }
        self.emulator.set_emulation_speed(self.config.emulation_speed);
        self.state = EpisodeState::Running;

        if save_state.is_none() {
            for input in self.policy.intro_script() {
                if let Some(button) = input.button {
                    self.emulator.press(button)?;
                }
                if !self.emulator.tick(input.wait)? {
                    self.state = EpisodeState::Terminal(TerminalReason::EmulatorStopped);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Runs one controller decision and returns the resulting state.
    pub fn step(&mut self) -> Result<EpisodeState, EpisodeError> {
        if !self.state.is_running() {
            return Err(EpisodeError::InvalidState { state: self.state });
        }

        if !self.emulator.tick(1)? {
            self.state = EpisodeState::Terminal(TerminalReason::EmulatorStopped);
            return Ok(self.state);
        }

        let prev = self.policy.snapshot(&mut self.emulator);
        let frame = self.emulator.screen().downscale(self.policy.frame_scale());
        self.frames.push(&frame);

        let action_count = self.policy.actions().len();
        let recent = self
            .recent_actions
            .iter()
            .map(|&i| normalize_action(i, action_count))
            .collect::<Vec<_>>();
        self.observation.clear();
        self.policy.encode(&prev, &recent, &mut self.observation);
        self.frames.write_normalized(&mut self.observation);

        let outputs = self.controller.activate(&self.observation)?;
        if outputs.len() != action_count {
            return Err(EpisodeError::OutputLength {
                expected: action_count,
                actual: outputs.len(),
            });
        }
        let index = select_action(&outputs).unwrap_or(0);
        let action = self.policy.actions()[index];
        self.recent_actions.push(index);
        self.actions.push(action);

        if let Some(button) = action.button() {
            self.emulator.press(button)?;
        }
        let alive = self.emulator.tick(self.config.wait_for_action)?;

        let next = self.policy.snapshot(&mut self.emulator);
        let reward = self.policy.reward(&prev, &next);
        self.total_reward += reward;
        self.steps += 1;
        if reward == 0.0 {
            self.steps_without_reward += 1;
        } else {
            self.steps_without_reward = 0;
        }

        if !alive {
            self.state = EpisodeState::Terminal(TerminalReason::EmulatorStopped);
        } else if self.policy.is_game_over(&next) {
            self.state = EpisodeState::Terminal(TerminalReason::GameOver);
        } else if self.steps_without_reward >= self.config.stall_limit {
            self.state = EpisodeState::Terminal(TerminalReason::Stalled);
        }
        Ok(self.state)
    }

    /// Runs the episode to completion. The emulator is stopped whether the episode
    /// ends normally or with an error.
    pub fn run(mut self, save_state: Option<&[u8]>) -> Result<EpisodeOutcome, EpisodeError> {
        let result = self.run_to_terminal(save_state);
        self.emulator.stop();
        let reason = result?;
        tracing::debug!(
            %reason,
            steps = self.steps,
            fitness = self.total_reward,
            "episode finished"
        );
        Ok(EpisodeOutcome {
            fitness: self.total_reward,
            steps: self.steps,
            reason,
            actions: self.actions,
        })
    }

    fn run_to_terminal(&mut self, save_state: Option<&[u8]>) -> Result<TerminalReason, EpisodeError> {
        self.init(save_state)?;
        loop {
            match self.state {
                EpisodeState::Terminal(reason) => return Ok(reason),
                EpisodeState::Init | EpisodeState::Running => {
                    self.step()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use gbneat_engine::{Button, ReadMemory, Screen};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::{
        pokemon_red::{PokemonRedPolicy, PokemonRedRewards},
        tetris::{self, TetrisPolicy, TetrisRewards},
    };

    type TickHook = Box<dyn FnMut(u64, &mut Vec<u8>)>;

    #[derive(Debug, Default)]
    struct Log {
        presses: Vec<Button>,
        loaded: Option<Vec<u8>>,
        speed: Option<u32>,
        frames: u64,
        stopped: bool,
    }

    struct FakeEmulator {
        memory: Vec<u8>,
        log: Rc<RefCell<Log>>,
        on_tick: Option<TickHook>,
        stop_at_frame: Option<u64>,
        fail_press: bool,
    }

    impl FakeEmulator {
        fn new() -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let emulator = Self {
                memory: vec![0; 0x10000],
                log: Rc::clone(&log),
                on_tick: None,
                stop_at_frame: None,
                fail_press: false,
            };
            (emulator, log)
        }
    }

    impl ReadMemory for FakeEmulator {
        fn read_memory(&mut self, address: u16) -> u8 {
            self.memory.read_memory(address)
        }
    }

    impl Emulator for FakeEmulator {
        fn tick(&mut self, frames: u32) -> Result<bool, EmulatorError> {
            let mut log = self.log.borrow_mut();
            if log.stopped {
                return Err(EmulatorError::Stopped);
            }
            log.frames += u64::from(frames);
            if let Some(hook) = &mut self.on_tick {
                hook(log.frames, &mut self.memory);
            }
            Ok(self.stop_at_frame.is_none_or(|stop| log.frames < stop))
        }

        fn press(&mut self, button: Button) -> Result<(), EmulatorError> {
            if self.fail_press {
                return Err(EmulatorError::Backend {
                    message: "joypad unplugged".to_owned(),
                });
            }
            self.log.borrow_mut().presses.push(button);
            Ok(())
        }

        fn screen(&mut self) -> Screen {
            Screen::blank()
        }

        fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError> {
            self.log.borrow_mut().loaded = Some(state.to_vec());
            Ok(())
        }

        fn set_emulation_speed(&mut self, speed: u32) {
            self.log.borrow_mut().speed = Some(speed);
        }

        fn stop(&mut self) {
            self.log.borrow_mut().stopped = true;
        }
    }

    fn config(stall_limit: u32) -> EpisodeConfig {
        EpisodeConfig {
            stall_limit,
            ..EpisodeConfig::default()
        }
    }

    fn always(index: usize, count: usize) -> impl FnMut(&[f64]) -> Result<Vec<f64>, ControllerError> {
        move |_| {
            let mut out = vec![0.0; count];
            out[index] = 1.0;
            Ok(out)
        }
    }

    fn tetris() -> TetrisPolicy {
        TetrisPolicy::new(TetrisRewards::default())
    }

    #[test]
    fn test_select_action_ties_go_to_lowest_index() {
        assert_eq!(select_action(&[0.1, 0.9, 0.9, 0.2]), Some(1));
        assert_eq!(select_action(&[0.0, 0.0]), Some(0));
        assert_eq!(select_action(&[-1.0, -3.0, -0.5]), Some(2));
        assert_eq!(select_action(&[]), None);
    }

    #[test]
    fn test_noop_controller_stalls_out() {
        let (emulator, log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(0);
        let runner = EpisodeRunner::new(emulator, tetris(), always(0, 7), config(25), &mut rng);

        let outcome = runner.run(Some(&[1, 2, 3])).unwrap();

        assert_eq!(outcome.reason, TerminalReason::Stalled);
        assert_eq!(outcome.steps, 25);
        assert_eq!(outcome.fitness, 0.0);
        assert!(outcome.actions.iter().all(|a| *a == Action::Noop));
        let log = log.borrow();
        assert!(log.stopped);
        assert!(log.presses.is_empty());
        assert_eq!(log.loaded.as_deref(), Some(&[1, 2, 3][..]));
        assert_eq!(log.speed, Some(10));
    }

    #[test]
    fn test_score_resets_stall_counter() {
        let (mut emulator, _log) = FakeEmulator::new();
        // one step is two frames with wait_for_action = 1
        emulator.on_tick = Some(Box::new(|frame, memory| {
            if frame == 10 {
                memory[usize::from(tetris::address::SCORE)] = 0x40;
            }
        }));
        let mut rng = Pcg32::seed_from_u64(0);
        let runner = EpisodeRunner::new(emulator, tetris(), always(3, 7), config(8), &mut rng);

        let outcome = runner.run(None).unwrap();

        assert_eq!(outcome.reason, TerminalReason::Stalled);
        assert_eq!(outcome.fitness, 100.0);
        assert_eq!(outcome.steps, 5 + 8);
        assert!(outcome.actions.iter().all(|a| *a == Action::Press(Button::Left)));
    }

    #[test]
    fn test_game_over_ends_episode_with_penalty() {
        let (mut emulator, log) = FakeEmulator::new();
        emulator.on_tick = Some(Box::new(|frame, memory| {
            if frame >= 6 {
                memory[usize::from(tetris::address::GAME_STATE)] = 1;
            }
        }));
        let mut rng = Pcg32::seed_from_u64(1);
        let runner = EpisodeRunner::new(emulator, tetris(), always(1, 7), config(100), &mut rng);

        let outcome = runner.run(None).unwrap();

        assert_eq!(outcome.reason, TerminalReason::GameOver);
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.fitness, -10.0);
        assert_eq!(log.borrow().presses, vec![Button::A; 3]);
    }

    #[test]
    fn test_emulator_stop_is_terminal() {
        let (mut emulator, log) = FakeEmulator::new();
        emulator.stop_at_frame = Some(7);
        let mut rng = Pcg32::seed_from_u64(2);
        let runner = EpisodeRunner::new(emulator, tetris(), always(0, 7), config(100), &mut rng);

        let outcome = runner.run(None).unwrap();

        assert_eq!(outcome.reason, TerminalReason::EmulatorStopped);
        assert!(outcome.steps <= 4);
        assert!(log.borrow().stopped);
    }

    #[test]
    fn test_emulator_error_propagates_and_stops() {
        let (mut emulator, log) = FakeEmulator::new();
        emulator.fail_press = true;
        let mut rng = Pcg32::seed_from_u64(3);
        let runner = EpisodeRunner::new(emulator, tetris(), always(2, 7), config(100), &mut rng);

        let err = runner.run(None).unwrap_err();

        assert!(matches!(err, EpisodeError::Emulator(EmulatorError::Backend { .. })));
        assert!(log.borrow().stopped);
    }

    #[test]
    fn test_controller_error_propagates() {
        let (emulator, log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(4);
        let controller = |_: &[f64]| -> Result<Vec<f64>, ControllerError> {
            Err(ControllerError::new("bad input length"))
        };
        let runner = EpisodeRunner::new(emulator, tetris(), controller, config(100), &mut rng);

        let err = runner.run(None).unwrap_err();

        assert!(matches!(err, EpisodeError::Controller(_)));
        assert!(err.to_string().contains("bad input length"));
        assert!(log.borrow().stopped);
    }

    #[test]
    fn test_wrong_output_count_is_an_error() {
        let (emulator, _log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(5);
        let runner = EpisodeRunner::new(emulator, tetris(), always(0, 3), config(100), &mut rng);

        let err = runner.run(None).unwrap_err();

        assert!(matches!(
            err,
            EpisodeError::OutputLength {
                expected: 7,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_observation_is_normalized_and_sized() {
        let (emulator, _log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(6);
        let expected_len = tetris().observation_len(5);
        let controller = move |inputs: &[f64]| -> Result<Vec<f64>, ControllerError> {
            assert_eq!(inputs.len(), expected_len);
            assert!(inputs.iter().all(|v| (0.0..=1.0).contains(v)));
            Ok(vec![0.0; 7])
        };
        let runner = EpisodeRunner::new(emulator, tetris(), controller, config(3), &mut rng);

        let outcome = runner.run(None).unwrap();
        assert_eq!(outcome.steps, 3);
    }

    #[test]
    fn test_recent_actions_seeded_in_range() {
        let (emulator, _log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(7);
        let runner = EpisodeRunner::new(emulator, tetris(), always(0, 7), config(3), &mut rng);

        assert_eq!(runner.recent_actions().len(), 5);
        assert!(runner.recent_actions().iter().all(|&i| i < 7));
    }

    #[test]
    fn test_recent_actions_track_choices() {
        let (emulator, _log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(8);
        let mut runner = EpisodeRunner::new(emulator, tetris(), always(4, 7), config(100), &mut rng);

        runner.init(None).unwrap();
        for _ in 0..6 {
            runner.step().unwrap();
        }

        assert_eq!(runner.recent_actions().to_vec(), vec![4; 5]);
        assert_eq!(runner.actions().len(), 6);
    }

    #[test]
    fn test_step_before_init_is_rejected() {
        let (emulator, _log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(9);
        let mut runner = EpisodeRunner::new(emulator, tetris(), always(0, 7), config(3), &mut rng);

        assert!(matches!(
            runner.step(),
            Err(EpisodeError::InvalidState {
                state: EpisodeState::Init
            })
        ));
    }

    #[test]
    fn test_intro_script_played_without_save_state() {
        let (emulator, log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(10);
        let policy = PokemonRedPolicy::new(PokemonRedRewards::default());
        let mut runner = EpisodeRunner::new(emulator, policy, always(0, 9), config(3), &mut rng);

        runner.init(None).unwrap();

        let log = log.borrow();
        assert_eq!(log.presses.len(), 35);
        assert_eq!(log.presses[0], Button::Start);
        assert_eq!(log.frames, 500 + 35 * 300);
        assert!(log.loaded.is_none());
    }

    #[test]
    fn test_intro_script_skipped_with_save_state() {
        let (emulator, log) = FakeEmulator::new();
        let mut rng = Pcg32::seed_from_u64(11);
        let policy = PokemonRedPolicy::new(PokemonRedRewards::default());
        let mut runner = EpisodeRunner::new(emulator, policy, always(0, 9), config(3), &mut rng);

        runner.init(Some(&[0xAB])).unwrap();

        assert!(log.borrow().presses.is_empty());
        assert_eq!(log.borrow().frames, 0);
        assert!(runner.state().is_running());
    }
}
