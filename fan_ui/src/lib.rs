#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Interactive operator session for the fan rig.
//!
//! The menu is a small state machine driven by a [`Prompt`]:
//! collect a plan, wait for "1", run it, wait for "2", start over.
//! End of input at any prompt ends the session, and so does the
//! cancellation flag once it is seen after an answer.
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fan_core::{PhasePlan, TestPlan};

/// Exclusive upper bounds on prompt answers.
const PHASE_COUNT_LIMIT: u32 = 11;
const DURATION_LIMIT: u32 = 60_001;
const DUTY_LIMIT: u32 = 96;
const REPETITIONS_LIMIT: u32 = 1_001;

/// Source of operator answers.
pub trait Prompt {
    /// Show `message` and read one answer; `None` on end of input.
    fn ask(&mut self, message: &str) -> io::Result<Option<String>>;

    /// Show an informational line.
    fn say(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Prompt + ?Sized> Prompt for &mut T {
    fn ask(&mut self, message: &str) -> io::Result<Option<String>> {
        (**self).ask(message)
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        (**self).say(message)
    }
}

/// Line-oriented prompt over any reader/writer pair (stdin/stdout in the CLI).
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn ask(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{message}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}

/// Parse a prompt answer: digits only and below `limit`, anything else is 0.
pub fn parse_bounded(answer: &str, limit: u32) -> u32 {
    let answer = answer.trim();
    if answer.is_empty() || !answer.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    match answer.parse::<u32>() {
        Ok(v) if v < limit => v,
        _ => 0,
    }
}

/// How a plan handed to the runner ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    CollectingPlan,
    Running(TestPlan),
    AwaitingContinue,
    Done,
}

pub struct Session<P: Prompt> {
    prompt: P,
    state: SessionState,
    cancel: Arc<AtomicBool>,
}

impl<P: Prompt> Session<P> {
    pub fn new(prompt: P) -> Self {
        Self::with_cancel(prompt, Arc::new(AtomicBool::new(false)))
    }

    /// Session that ends as soon as `cancel` is observed set.
    pub fn with_cancel(prompt: P, cancel: Arc<AtomicBool>) -> Self {
        Self {
            prompt,
            state: SessionState::CollectingPlan,
            cancel,
        }
    }

    /// Whether the session ended because of the cancellation flag.
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_prompt(self) -> P {
        self.prompt
    }

    /// Drive the session until `Done`. Runner errors end the session.
    pub fn run<F>(&mut self, mut runner: F) -> eyre::Result<()>
    where
        F: FnMut(&TestPlan) -> eyre::Result<RunOutcome>,
    {
        while self.state != SessionState::Done {
            self.step(&mut runner)?;
        }
        Ok(())
    }

    /// Perform one transition.
    pub fn step<F>(&mut self, runner: &mut F) -> eyre::Result<()>
    where
        F: FnMut(&TestPlan) -> eyre::Result<RunOutcome>,
    {
        if self.cancelled() && self.state != SessionState::Done {
            tracing::info!(state = ?self.state, "session cancelled");
            self.state = SessionState::Done;
            return Ok(());
        }
        let next = match std::mem::replace(&mut self.state, SessionState::Done) {
            SessionState::CollectingPlan => self.collect_plan()?,
            SessionState::Running(plan) => match runner(&plan)? {
                RunOutcome::Completed => SessionState::AwaitingContinue,
                RunOutcome::Cancelled => {
                    self.prompt.say("Test cancelled.")?;
                    SessionState::Done
                }
            },
            SessionState::AwaitingContinue => {
                if self.wait_for("To continue, press '2' and ENTER: ", "2")? {
                    SessionState::CollectingPlan
                } else {
                    SessionState::Done
                }
            }
            SessionState::Done => SessionState::Done,
        };
        tracing::debug!(state = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// One answer, or `None` on end of input or once cancelled.
    fn answer(&mut self, message: &str) -> io::Result<Option<String>> {
        let answer = self.prompt.ask(message)?;
        if self.cancelled() {
            return Ok(None);
        }
        Ok(answer)
    }

    fn ask_bounded(&mut self, message: &str, limit: u32) -> io::Result<Option<u32>> {
        Ok(self
            .answer(message)?
            .map(|answer| parse_bounded(&answer, limit)))
    }

    fn collect_plan(&mut self) -> eyre::Result<SessionState> {
        self.prompt.say("FAN TESTING")?;
        self.prompt
            .say("To stop the test at any time, press CTRL + C.")?;
        let Some(count) = self.ask_bounded("Enter number of phases (max 10): ", PHASE_COUNT_LIMIT)?
        else {
            return Ok(SessionState::Done);
        };
        if count == 0 {
            tracing::info!("no phases entered, ending session");
            return Ok(SessionState::Done);
        }

        let mut phases = Vec::with_capacity(count as usize);
        for n in 1..=count {
            let Some(phase) = self.collect_phase(n)? else {
                return Ok(SessionState::Done);
            };
            phases.push(phase);
        }
        let plan = TestPlan::new(phases)?;

        if self.wait_for("To begin testing, press '1' and ENTER: ", "1")? {
            Ok(SessionState::Running(plan))
        } else {
            Ok(SessionState::Done)
        }
    }

    /// Ask for phase `n` until it validates; `None` on end of input.
    fn collect_phase(&mut self, n: u32) -> io::Result<Option<PhasePlan>> {
        loop {
            let Some(duration) =
                self.ask_bounded(&format!("Enter phase {n} duration (mins): "), DURATION_LIMIT)?
            else {
                return Ok(None);
            };
            let Some(duty) = self.ask_bounded(&format!("Enter phase {n} PWM %: "), DUTY_LIMIT)?
            else {
                return Ok(None);
            };
            let Some(repetitions) = self.ask_bounded(
                &format!("Enter phase {n} repetitions: "),
                REPETITIONS_LIMIT,
            )?
            else {
                return Ok(None);
            };
            // DUTY_LIMIT keeps duty within u8.
            let duty = u8::try_from(duty).unwrap_or(0);
            match PhasePlan::new(duration, duty, repetitions) {
                Ok(phase) => return Ok(Some(phase)),
                Err(e) => {
                    tracing::debug!(phase = n, error = %e, "phase rejected");
                    self.prompt
                        .say(&format!("Phase {n} is invalid ({e}), please re-enter."))?;
                }
            }
        }
    }

    /// Ask until the answer is `expected`; false on end of input.
    fn wait_for(&mut self, message: &str, expected: &str) -> io::Result<bool> {
        loop {
            match self.answer(message)? {
                Some(answer) if answer.trim() == expected => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }
    }
}
