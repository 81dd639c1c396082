//! Totally-ordered enums shared across the engine.
//!
//! Several of these rely on discriminant order for status combination (the
//! caller takes `max()` of child statuses), so the derive order here matches
//! the canonical ordering, not alphabetical order.

use serde::{Deserialize, Serialize};

/// Severity of a single [`crate::event::Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventPriority {
    Info,
    Warning,
    Error,
    Critical,
}

/// Outcome of a single task (collector, analyzer, connection manager).
///
/// Discriminants mirror the reference implementation's explicit integer
/// values so serialized logs stay comparable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Unset = 0,
    NotRan = 10,
    Ok = 20,
    Warning = 30,
    Error = 40,
    ExecutionFailure = 50,
}

impl ExecutionStatus {
    /// `true` once the status is no longer the zero-value placeholder.
    pub fn is_set(self) -> bool {
        self != ExecutionStatus::Unset
    }

    /// The exit-code-relevant threshold: anything above `Warning` fails a run.
    pub fn exceeds_warning(self) -> bool {
        self > ExecutionStatus::Warning
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        ExecutionStatus::Unset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OsFamily {
    Linux,
    Windows,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemLocation {
    Local,
    Remote,
}

/// Gates which commands a collector may issue against the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemInteractionLevel {
    /// Read-only, non-invasive commands only.
    Surface,
    /// Ordinary commands, including reads that may be mildly invasive.
    Standard,
    /// Commands that can alter system state: privileged writes, reboots.
    Disruptive,
}

/// Closed set of domain tags an [`crate::event::Event`] may be categorized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Os,
    Platform,
    Io,
    Memory,
    Storage,
    Compute,
    Fw,
    SwDriver,
    Bios,
    Ssh,
    Ras,
    Application,
    Runtime,
    Infrastructure,
    Network,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ExecutionStatus::Unset, ExecutionStatus::NotRan)]
    #[case(ExecutionStatus::NotRan, ExecutionStatus::Ok)]
    #[case(ExecutionStatus::Ok, ExecutionStatus::Warning)]
    #[case(ExecutionStatus::Warning, ExecutionStatus::Error)]
    #[case(ExecutionStatus::Error, ExecutionStatus::ExecutionFailure)]
    fn execution_status_orders_by_severity(#[case] lower: ExecutionStatus, #[case] higher: ExecutionStatus) {
        assert!(higher > lower);
    }

    #[rstest]
    #[case(EventPriority::Warning, EventPriority::Error)]
    #[case(EventPriority::Error, EventPriority::Critical)]
    fn event_priority_orders_by_severity(#[case] lower: EventPriority, #[case] higher: EventPriority) {
        assert!(higher > lower);
        assert!(lower >= EventPriority::Info);
    }

    #[test]
    fn interaction_level_orders_surface_lowest() {
        assert!(SystemInteractionLevel::Surface < SystemInteractionLevel::Standard);
        assert!(SystemInteractionLevel::Standard < SystemInteractionLevel::Disruptive);
    }

    #[rstest]
    #[case(ExecutionStatus::Unset, false)]
    #[case(ExecutionStatus::NotRan, false)]
    #[case(ExecutionStatus::Ok, false)]
    #[case(ExecutionStatus::Warning, false)]
    #[case(ExecutionStatus::Error, true)]
    #[case(ExecutionStatus::ExecutionFailure, true)]
    fn exceeds_warning_threshold(#[case] status: ExecutionStatus, #[case] expected: bool) {
        assert_eq!(status.exceeds_warning(), expected);
    }
}
