use serde::{Deserialize, Serialize};

/// Which phase of the focus cycle is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Work,
    Break,
}

impl TimerMode {
    /// The mode that follows this one when the countdown reaches zero.
    pub fn next(self) -> Self {
        match self {
            TimerMode::Work => TimerMode::Break,
            TimerMode::Break => TimerMode::Work,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Work => "work",
            TimerMode::Break => "break",
        }
    }

    /// Title and body of the notification shown when this mode completes.
    pub fn completion_message(self) -> (&'static str, &'static str) {
        match self {
            TimerMode::Work => ("Work session completed!", "Time for a break!"),
            TimerMode::Break => ("Break time over!", "Ready for another work session?"),
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined mode and activity, the four states of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerStatus {
    IdleWork,
    RunningWork,
    IdleBreak,
    RunningBreak,
}

impl TimerStatus {
    pub fn from_parts(mode: TimerMode, is_active: bool) -> Self {
        match (mode, is_active) {
            (TimerMode::Work, false) => TimerStatus::IdleWork,
            (TimerMode::Work, true) => TimerStatus::RunningWork,
            (TimerMode::Break, false) => TimerStatus::IdleBreak,
            (TimerMode::Break, true) => TimerStatus::RunningBreak,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, TimerStatus::RunningWork | TimerStatus::RunningBreak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_alternates() {
        assert_eq!(TimerMode::Work.next(), TimerMode::Break);
        assert_eq!(TimerMode::Break.next(), TimerMode::Work);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TimerMode::Break).unwrap(), "\"break\"");
        let mode: TimerMode = serde_json::from_str("\"work\"").unwrap();
        assert_eq!(mode, TimerMode::Work);
    }

    #[test]
    fn status_from_parts() {
        assert_eq!(
            TimerStatus::from_parts(TimerMode::Break, true),
            TimerStatus::RunningBreak
        );
        assert!(!TimerStatus::from_parts(TimerMode::Work, false).is_running());
    }
}
