// ABOUTME: Per-step time limits for the deployment pipeline.
// ABOUTME: Durations use humantime syntax; `none` disables the limit for a step.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Upper bound on each pipeline step. `None` means the step may run forever.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepTimeouts {
    #[serde(default = "default_login", deserialize_with = "deserialize_limit")]
    pub login: Option<Duration>,

    #[serde(default = "default_pull", deserialize_with = "deserialize_limit")]
    pub pull: Option<Duration>,

    #[serde(default = "default_teardown", deserialize_with = "deserialize_limit")]
    pub teardown: Option<Duration>,

    #[serde(default = "default_migrate", deserialize_with = "deserialize_limit")]
    pub migrate: Option<Duration>,

    #[serde(default = "default_start", deserialize_with = "deserialize_limit")]
    pub start: Option<Duration>,

    #[serde(default = "default_reclaim", deserialize_with = "deserialize_limit")]
    pub reclaim: Option<Duration>,
}

fn default_login() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_pull() -> Option<Duration> {
    Some(Duration::from_secs(15 * 60))
}

fn default_teardown() -> Option<Duration> {
    Some(Duration::from_secs(5 * 60))
}

fn default_migrate() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60))
}

fn default_start() -> Option<Duration> {
    Some(Duration::from_secs(5 * 60))
}

fn default_reclaim() -> Option<Duration> {
    Some(Duration::from_secs(5 * 60))
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            login: default_login(),
            pull: default_pull(),
            teardown: default_teardown(),
            migrate: default_migrate(),
            start: default_start(),
            reclaim: default_reclaim(),
        }
    }
}

impl StepTimeouts {
    /// Longest a whole run may take, or `None` if any step is unbounded.
    pub fn total(&self) -> Option<Duration> {
        [
            self.login,
            self.pull,
            self.teardown,
            self.migrate,
            self.start,
            self.reclaim,
        ]
        .into_iter()
        .sum()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Limit(#[serde(with = "humantime_serde")] Duration),
    Keyword(String),
}

fn deserialize_limit<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawLimit>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawLimit::Limit(d)) => Ok(Some(d)),
        Some(RawLimit::Keyword(k)) if k.eq_ignore_ascii_case("none") => Ok(None),
        Some(RawLimit::Keyword(k)) => Err(serde::de::Error::custom(format!(
            "invalid timeout {k:?}: expected a duration like 90s or 5m, or none"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let timeouts: StepTimeouts = serde_yaml::from_str("pull: 2m").unwrap();
        assert_eq!(timeouts.pull, Some(Duration::from_secs(120)));
        assert_eq!(timeouts.migrate, Some(Duration::from_secs(1800)));
        assert_eq!(timeouts.login, Some(Duration::from_secs(60)));
    }

    #[test]
    fn none_disables_a_limit() {
        let timeouts: StepTimeouts = serde_yaml::from_str("reclaim: none\nstart: ~").unwrap();
        assert_eq!(timeouts.reclaim, None);
        assert_eq!(timeouts.start, None);
    }

    #[test]
    fn total_adds_every_step() {
        assert_eq!(
            StepTimeouts::default().total(),
            Some(Duration::from_secs(61 * 60))
        );

        let timeouts: StepTimeouts = serde_yaml::from_str("migrate: none").unwrap();
        assert_eq!(timeouts.total(), None);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = serde_yaml::from_str::<StepTimeouts>("teardown: soon").unwrap_err();
        assert!(err.to_string().contains("invalid timeout"));
    }
}
