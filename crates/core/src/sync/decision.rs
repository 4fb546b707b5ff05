//! Job decision table
//!
//! Pure function deciding whether a candidate job runs now, stays pending,
//! or is discarded. The scheduler evaluates it every time a job becomes a
//! candidate: on arrival, on timer fire and on canary retries.

use cadence_domain::{impl_wire_name_conversions, ModelTypeSet, SchedulerMode, WaitInterval};
use uuid::Uuid;

use crate::sync::job::{Job, JobKind, JobPriority};

/// What to do with a candidate job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobDecision {
    /// Run it now.
    Continue,
    /// Keep it pending for a later attempt.
    Save,
    /// Discard it.
    Drop,
}

impl_wire_name_conversions!(JobDecision {
    Continue => "continue",
    Save => "save",
    Drop => "drop",
});

/// Scheduler state the decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub mode: SchedulerMode,
    pub wait_interval: Option<&'a WaitInterval>,
    pub has_invalid_auth_token: bool,
    pub throttled_types: &'a ModelTypeSet,
    /// Id of the configuration job currently held by the scheduler.
    pub current_config_job: Option<Uuid>,
}

/// Decides the fate of `job`.
///
/// Partially throttled nudges are expected to have had their throttled
/// types split off already; a nudge reaching this point with only throttled
/// types is saved.
pub fn decide_on_job(job: &Job, ctx: &DecisionContext<'_>) -> JobDecision {
    if let Some(interval) = ctx.wait_interval {
        return decide_while_in_wait_interval(job, ctx.mode, interval);
    }

    if job.kind() == JobKind::Nudge {
        let requested = job.requested_types();
        if !requested.is_empty() && requested.is_subset(ctx.throttled_types) {
            return JobDecision::Save;
        }
    }

    match ctx.mode {
        SchedulerMode::Configuration => match job.kind() {
            JobKind::Nudge => JobDecision::Save,
            JobKind::Configuration => {
                if ctx.current_config_job.is_some_and(|id| id != job.id()) {
                    JobDecision::Drop
                } else {
                    JobDecision::Continue
                }
            },
            JobKind::Poll => JobDecision::Drop,
        },
        SchedulerMode::Normal => {
            if job.kind() == JobKind::Configuration {
                return JobDecision::Drop;
            }
            if !ctx.has_invalid_auth_token {
                return JobDecision::Continue;
            }
            match job.kind() {
                JobKind::Nudge => JobDecision::Save,
                _ => JobDecision::Drop,
            }
        },
    }
}

fn decide_while_in_wait_interval(
    job: &Job,
    mode: SchedulerMode,
    interval: &WaitInterval,
) -> JobDecision {
    if job.kind() == JobKind::Poll {
        return JobDecision::Drop;
    }
    if job.kind() == JobKind::Nudge && mode == SchedulerMode::Configuration {
        return JobDecision::Save;
    }
    match job.priority() {
        JobPriority::Canary => JobDecision::Continue,
        JobPriority::Normal => {
            if interval.is_throttled() {
                tracing::trace!(job = %job.id(), "job saved while throttled");
            }
            JobDecision::Save
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence_common::{Clock, MockClock};
    use cadence_domain::{ModelType, SyncSourceInfo, UpdatesSource, WaitMode};

    use super::*;
    use crate::sync::job::ConfigurationParams;

    fn nudge(clock: &MockClock, types: &[ModelType]) -> Job {
        let source = SyncSourceInfo::new(
            UpdatesSource::Local,
            types.iter().map(|t| (*t, String::new())).collect(),
        );
        Job::nudge(source, clock.now(), clock.now(), "test")
    }

    fn ctx<'a>(
        mode: SchedulerMode,
        wait: Option<&'a WaitInterval>,
        throttled: &'a ModelTypeSet,
    ) -> DecisionContext<'a> {
        DecisionContext {
            mode,
            wait_interval: wait,
            has_invalid_auth_token: false,
            throttled_types: throttled,
            current_config_job: None,
        }
    }

    #[test]
    fn idle_normal_mode_runs_nudges_and_polls() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let c = ctx(SchedulerMode::Normal, None, &none);

        let job = nudge(&clock, &[ModelType::Bookmarks]);
        assert_eq!(decide_on_job(&job, &c), JobDecision::Continue);
        let poll = Job::poll(SyncSourceInfo::default(), clock.now(), "poll");
        assert_eq!(decide_on_job(&poll, &c), JobDecision::Continue);
    }

    #[test]
    fn throttled_saves_normal_and_runs_canary() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let wait = WaitInterval::new(WaitMode::Throttled, Duration::from_secs(30), clock.now());
        let c = ctx(SchedulerMode::Normal, Some(&wait), &none);

        let mut job = nudge(&clock, &[ModelType::Bookmarks]);
        assert_eq!(decide_on_job(&job, &c), JobDecision::Save);

        job.set_priority(JobPriority::Canary);
        assert_eq!(decide_on_job(&job, &c), JobDecision::Continue);
    }

    #[test]
    fn backoff_drops_polls() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let wait =
            WaitInterval::new(WaitMode::ExponentialBackoff, Duration::from_secs(1), clock.now());
        let c = ctx(SchedulerMode::Normal, Some(&wait), &none);

        let poll = Job::poll(SyncSourceInfo::default(), clock.now(), "poll");
        assert_eq!(decide_on_job(&poll, &c), JobDecision::Drop);
    }

    #[test]
    fn fully_throttled_nudge_is_saved() {
        let clock = MockClock::new();
        let throttled: ModelTypeSet =
            [ModelType::Bookmarks, ModelType::Passwords].into_iter().collect();
        let c = ctx(SchedulerMode::Normal, None, &throttled);

        assert_eq!(decide_on_job(&nudge(&clock, &[ModelType::Bookmarks]), &c), JobDecision::Save);
        assert_eq!(
            decide_on_job(&nudge(&clock, &[ModelType::Bookmarks, ModelType::Themes]), &c),
            JobDecision::Continue
        );
    }

    #[test]
    fn configuration_mode_saves_nudges_and_drops_stale_configs() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let params = ConfigurationParams::new(UpdatesSource::Reconfiguration, ModelTypeSet::new());
        let config = Job::configuration(params, clock.now(), "configure");

        let mut c = ctx(SchedulerMode::Configuration, None, &none);
        assert_eq!(decide_on_job(&nudge(&clock, &[ModelType::Apps]), &c), JobDecision::Save);

        c.current_config_job = Some(config.id());
        assert_eq!(decide_on_job(&config, &c), JobDecision::Continue);

        c.current_config_job = Some(Uuid::now_v7());
        assert_eq!(decide_on_job(&config, &c), JobDecision::Drop);
    }

    #[test]
    fn normal_mode_drops_configuration() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let params = ConfigurationParams::new(UpdatesSource::Reconfiguration, ModelTypeSet::new());
        let config = Job::configuration(params, clock.now(), "configure");

        assert_eq!(
            decide_on_job(&config, &ctx(SchedulerMode::Normal, None, &none)),
            JobDecision::Drop
        );
    }

    #[test]
    fn invalid_auth_saves_nudges_and_drops_polls() {
        let clock = MockClock::new();
        let none = ModelTypeSet::new();
        let mut c = ctx(SchedulerMode::Normal, None, &none);
        c.has_invalid_auth_token = true;

        assert_eq!(decide_on_job(&nudge(&clock, &[ModelType::Bookmarks]), &c), JobDecision::Save);
        let poll = Job::poll(SyncSourceInfo::default(), clock.now(), "poll");
        assert_eq!(decide_on_job(&poll, &c), JobDecision::Drop);
    }

    #[test]
    fn decision_wire_names() {
        assert_eq!(JobDecision::Save.to_string(), "save");
        assert_eq!("CONTINUE".parse::<JobDecision>().ok(), Some(JobDecision::Continue));
    }
}
