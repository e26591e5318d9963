//! Worker configuration loaded from environment variables.

use std::time::Duration;

use voicereel_core::job_type::JobType;
use voicereel_core::retry::RetryPolicy;

/// Per-queue tuning: how many polling slots run the queue, and the time
/// limits a single handler invocation lives under.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// Number of concurrent polling slots for this queue.
    pub concurrency: usize,
    /// After this long a warning is logged; the handler is still
    /// allowed to finish.
    pub soft_time_limit: Duration,
    /// After this long the handler future is dropped and the job fails
    /// with `TIMEOUT`.
    pub hard_time_limit: Duration,
}

/// Worker process configuration.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub register_speaker: QueueSettings,
    pub synthesize: QueueSettings,
    pub cleanup: QueueSettings,

    /// Broker visibility timeout granted on dequeue. Must exceed the
    /// largest hard time limit, or a live handler's message becomes
    /// claimable while it still runs.
    pub lease_duration: Duration,
    /// Delay between polls of an empty queue.
    pub poll_interval: Duration,
    /// How often a slot re-reads `cancel_requested` while a handler runs.
    pub cancel_poll_interval: Duration,

    /// Delay before the first retry of a transient failure.
    pub retry_base_delay: Duration,
    /// Upper bound on the retry delay.
    pub retry_max_delay: Duration,
    /// Broker redeliveries allowed before a message dead-letters. Kept
    /// above every retry budget so exhaustion is always decided by the
    /// job store, not the broker.
    pub max_deliveries: i32,

    /// A slot exits and is respawned fresh after this many handled
    /// messages, bounding leak accumulation in long-lived processes.
    pub recycle_after_tasks: u32,

    /// How often the reaper sweeps old terminal jobs.
    pub reaper_interval: Duration,
    /// How often a `cleanup` job is enqueued.
    pub cleanup_interval: Duration,
    /// Terminal jobs and stored artifacts older than this are purged.
    pub max_age_hours: f64,

    /// Base URL of the speech-engine sidecar.
    pub engine_url: String,
    /// Root directory of the artifact store.
    pub storage_root: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            register_speaker: QueueSettings {
                concurrency: 2,
                soft_time_limit: Duration::from_secs(240),
                hard_time_limit: Duration::from_secs(300),
            },
            synthesize: QueueSettings {
                concurrency: 1,
                soft_time_limit: Duration::from_secs(540),
                hard_time_limit: Duration::from_secs(600),
            },
            cleanup: QueueSettings {
                concurrency: 1,
                soft_time_limit: Duration::from_secs(240),
                hard_time_limit: Duration::from_secs(300),
            },
            lease_duration: Duration::from_secs(660),
            poll_interval: Duration::from_secs(1),
            cancel_poll_interval: Duration::from_secs(2),
            retry_base_delay: Duration::from_secs(60),
            retry_max_delay: Duration::from_secs(900),
            max_deliveries: 10,
            recycle_after_tasks: 10,
            reaper_interval: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
            max_age_hours: 48.0,
            engine_url: "http://localhost:9880".into(),
            storage_root: "/var/lib/voicereel/artifacts".into(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                        |
    /// |----------------------------------|--------------------------------|
    /// | `REGISTER_WORKERS`               | `2`                            |
    /// | `SYNTHESIZE_WORKERS`             | `1`                            |
    /// | `CLEANUP_WORKERS`                | `1`                            |
    /// | `REGISTER_SOFT_LIMIT_SECS`       | `240`                          |
    /// | `REGISTER_HARD_LIMIT_SECS`       | `300`                          |
    /// | `SYNTHESIZE_SOFT_LIMIT_SECS`     | `540`                          |
    /// | `SYNTHESIZE_HARD_LIMIT_SECS`     | `600`                          |
    /// | `LEASE_DURATION_SECS`            | `660`                          |
    /// | `POLL_INTERVAL_SECS`             | `1`                            |
    /// | `RETRY_BASE_DELAY_SECS`          | `60`                           |
    /// | `RETRY_MAX_DELAY_SECS`           | `900`                          |
    /// | `MAX_DELIVERIES`                 | `10`                           |
    /// | `RECYCLE_AFTER_TASKS`            | `10`                           |
    /// | `REAPER_INTERVAL_SECS`           | `3600`                         |
    /// | `CLEANUP_INTERVAL_SECS`          | `3600`                         |
    /// | `MAX_AGE_HOURS`                  | `48`                           |
    /// | `ENGINE_URL`                     | `http://localhost:9880`        |
    /// | `STORAGE_ROOT`                   | `/var/lib/voicereel/artifacts` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            register_speaker: QueueSettings {
                concurrency: env_parse("REGISTER_WORKERS", defaults.register_speaker.concurrency),
                soft_time_limit: env_secs(
                    "REGISTER_SOFT_LIMIT_SECS",
                    defaults.register_speaker.soft_time_limit,
                ),
                hard_time_limit: env_secs(
                    "REGISTER_HARD_LIMIT_SECS",
                    defaults.register_speaker.hard_time_limit,
                ),
            },
            synthesize: QueueSettings {
                concurrency: env_parse("SYNTHESIZE_WORKERS", defaults.synthesize.concurrency),
                soft_time_limit: env_secs(
                    "SYNTHESIZE_SOFT_LIMIT_SECS",
                    defaults.synthesize.soft_time_limit,
                ),
                hard_time_limit: env_secs(
                    "SYNTHESIZE_HARD_LIMIT_SECS",
                    defaults.synthesize.hard_time_limit,
                ),
            },
            cleanup: QueueSettings {
                concurrency: env_parse("CLEANUP_WORKERS", defaults.cleanup.concurrency),
                ..defaults.cleanup
            },
            lease_duration: env_secs("LEASE_DURATION_SECS", defaults.lease_duration),
            poll_interval: env_secs("POLL_INTERVAL_SECS", defaults.poll_interval),
            cancel_poll_interval: defaults.cancel_poll_interval,
            retry_base_delay: env_secs("RETRY_BASE_DELAY_SECS", defaults.retry_base_delay),
            retry_max_delay: env_secs("RETRY_MAX_DELAY_SECS", defaults.retry_max_delay),
            max_deliveries: env_parse("MAX_DELIVERIES", defaults.max_deliveries),
            recycle_after_tasks: env_parse("RECYCLE_AFTER_TASKS", defaults.recycle_after_tasks),
            reaper_interval: env_secs("REAPER_INTERVAL_SECS", defaults.reaper_interval),
            cleanup_interval: env_secs("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval),
            max_age_hours: env_parse("MAX_AGE_HOURS", defaults.max_age_hours),
            engine_url: std::env::var("ENGINE_URL").unwrap_or(defaults.engine_url),
            storage_root: std::env::var("STORAGE_ROOT").unwrap_or(defaults.storage_root),
        }
    }

    /// Settings for the queue serving a job type.
    pub fn queue(&self, job_type: JobType) -> &QueueSettings {
        match job_type {
            JobType::RegisterSpeaker => &self.register_speaker,
            JobType::Synthesize => &self.synthesize,
            JobType::Cleanup => &self.cleanup,
        }
    }

    /// Retry policy for a job type. The attempt budget comes from the
    /// type; the delays are process-wide.
    pub fn retry_policy(&self, job_type: JobType) -> RetryPolicy {
        RetryPolicy {
            max_attempts: job_type.default_max_attempts(),
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
