use std::hint::black_box;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::clock::{ticks_diff, Clock};
use crate::payload::PayloadPattern;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    /// Overrides the profile's trial count when set.
    pub trials: Option<usize>,
    /// Pause after each flash trial so the medium settles.
    pub pause: Duration,
    pub pattern: PayloadPattern,
}

impl BenchConfig {
    pub fn new(profile: Profile, seed: u64) -> Self {
        Self {
            profile,
            seed,
            trials: None,
            pause: Duration::from_millis(10),
            pattern: PayloadPattern::Counter,
        }
    }

    pub fn warmup_iters(&self) -> u64 {
        match self.profile {
            Profile::Quick => 1,
            Profile::Full => 2,
        }
    }

    pub fn trials(&self) -> usize {
        self.trials.unwrap_or(match self.profile {
            Profile::Quick => 3,
            Profile::Full => 5,
        })
    }
}

/// Reducing a trial set with no samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot reduce an empty trial set")]
pub struct EmptySetError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    #[error("trial count must be at least 1")]
    InvalidTrialCount,

    #[error(transparent)]
    EmptySet(#[from] EmptySetError),
}

/// Ordered durations of repeated trials under one configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrialSet {
    durations: Vec<Duration>,
}

impl TrialSet {
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn as_slice(&self) -> &[Duration] {
        &self.durations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.durations.iter()
    }

    pub fn min(&self) -> Option<Duration> {
        self.durations.iter().copied().min()
    }

    pub fn max(&self) -> Option<Duration> {
        self.durations.iter().copied().max()
    }

    /// Samples in microseconds, in trial order.
    pub fn micros(&self) -> Vec<f64> {
        self.durations.iter().map(|d| as_micros_f64(*d)).collect()
    }

    pub fn mean(&self) -> Result<Duration, EmptySetError> {
        reduce_mean(self)
    }
}

impl From<Vec<Duration>> for TrialSet {
    fn from(durations: Vec<Duration>) -> Self {
        Self { durations }
    }
}

/// Arithmetic mean of a trial set, in the same unit as its samples.
pub fn reduce_mean(set: &TrialSet) -> Result<Duration, EmptySetError> {
    if set.is_empty() {
        return Err(EmptySetError);
    }
    let total: u128 = set.iter().map(Duration::as_nanos).sum();
    let mean_ns = total / set.len() as u128;
    Ok(Duration::from_nanos(mean_ns as u64))
}

/// A trial set reduced for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchmarkResult {
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub samples: usize,
}

impl BenchmarkResult {
    pub fn from_set(set: &TrialSet) -> Result<Self, EmptySetError> {
        let mean = reduce_mean(set)?;
        let (min, max) = set.min().zip(set.max()).ok_or(EmptySetError)?;
        Ok(Self {
            mean,
            min,
            max,
            samples: set.len(),
        })
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean.as_secs_f64() * 1e3
    }
}

/// Trial sets from a create-then-overwrite run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColdWarm {
    pub cold: TrialSet,
    pub warm: TrialSet,
}

pub fn as_micros_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

/// Runs timed trials against an injected clock.
///
/// Trials are strictly sequential. Operation errors are returned untouched
/// and abort the current trial set; nothing is retried.
#[derive(Debug)]
pub struct Harness<C> {
    clock: C,
    pause: Option<Duration>,
}

impl<C: Clock> Harness<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, pause: None }
    }

    /// Sleep for `pause` after every trial, outside the timed window.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = (!pause.is_zero()).then_some(pause);
        self
    }

    /// Run `operation` untimed `iterations` times.
    pub fn warm_up<T, E>(
        &self,
        iterations: u64,
        mut operation: impl FnMut() -> Result<T, E>,
    ) -> Result<(), E> {
        for _ in 0..iterations {
            black_box(operation()?);
        }
        Ok(())
    }

    /// Time a single call of `operation`.
    pub fn measure_single<T, E>(
        &self,
        operation: impl FnOnce() -> Result<T, E>,
    ) -> Result<Duration, E> {
        let t0 = self.clock.ticks_us();
        let out = operation();
        let t1 = self.clock.ticks_us();
        black_box(out?);
        Ok(ticks_diff(t1, t0))
    }

    /// Time `count` sequential calls of `operation`.
    pub fn run_trials<T, E>(
        &self,
        operation: impl FnMut() -> Result<T, E>,
        count: usize,
    ) -> Result<TrialSet, E>
    where
        E: From<HarnessError>,
    {
        self.run_prepared(|| Ok(()), operation, count)
    }

    /// Like [`Harness::run_trials`], but calls `prepare` untimed before each trial.
    pub fn run_prepared<T, E>(
        &self,
        mut prepare: impl FnMut() -> Result<(), E>,
        mut operation: impl FnMut() -> Result<T, E>,
        count: usize,
    ) -> Result<TrialSet, E>
    where
        E: From<HarnessError>,
    {
        if count == 0 {
            return Err(HarnessError::InvalidTrialCount.into());
        }

        let mut durations = Vec::with_capacity(count);
        for trial in 0..count {
            prepare()?;
            let elapsed = self.measure_single(&mut operation)?;
            durations.push(elapsed);
            debug!(trial, elapsed_us = as_micros_f64(elapsed), "trial recorded");

            if let Some(pause) = self.pause {
                self.clock.sleep(pause);
            }
        }
        Ok(TrialSet::from(durations))
    }

    /// Cold trials (each after `setup_cold`), then warm trials (each after
    /// `setup_warm`), returning both trial sets.
    ///
    /// The warm phase reuses whatever the cold phase left behind, so the
    /// order is fixed. The resource stays in place afterwards.
    pub fn collect_cold_vs_warm<T, E>(
        &self,
        setup_cold: impl FnMut() -> Result<(), E>,
        setup_warm: impl FnMut() -> Result<(), E>,
        mut operation: impl FnMut() -> Result<T, E>,
        count: usize,
    ) -> Result<ColdWarm, E>
    where
        E: From<HarnessError>,
    {
        let cold = self.run_prepared(setup_cold, &mut operation, count)?;
        let warm = self.run_prepared(setup_warm, &mut operation, count)?;
        Ok(ColdWarm { cold, warm })
    }

    /// Mean cold and mean warm durations.
    pub fn run_cold_vs_warm<T, E>(
        &self,
        setup_cold: impl FnMut() -> Result<(), E>,
        setup_warm: impl FnMut() -> Result<(), E>,
        operation: impl FnMut() -> Result<T, E>,
        count: usize,
    ) -> Result<(Duration, Duration), E>
    where
        E: From<HarnessError>,
    {
        let sets = self.collect_cold_vs_warm(setup_cold, setup_warm, operation, count)?;
        let cold = reduce_mean(&sets.cold).map_err(HarnessError::from)?;
        let warm = reduce_mean(&sets.warm).map_err(HarnessError::from)?;
        Ok((cold, warm))
    }
}
