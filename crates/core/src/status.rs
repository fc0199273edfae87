//! Execution status vocabulary.
//!
//! Each variant's discriminant matches the seed data order (1-based) of the
//! `execution_statuses` lookup table. Remote status strings are normalized
//! through [`ExecutionStatus::from_remote`]; anything it does not recognize
//! is skipped by the reconciler rather than written.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant, in seed order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Canonical upper-case name, as stored and logged.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Lifecycle status of one remote deployment.
    ExecutionStatus {
        Queued = 1 => "QUEUED",
        PendingExecution = 2 => "PENDING_EXECUTION",
        Running = 3 => "RUNNING",
        Completed = 4 => "COMPLETED",
        DeployFailed = 5 => "DEPLOY_FAILED",
        RunFailed = 6 => "RUN_FAILED",
        RunPaused = 7 => "RUN_PAUSED",
        RunAborted = 8 => "RUN_ABORTED",
        RunTimedOut = 9 => "RUN_TIMED_OUT",
        Unknown = 10 => "UNKNOWN",
    }
}

/// Statuses after which no further transition is expected.
pub const TERMINAL_STATUSES: [ExecutionStatus; 6] = [
    ExecutionStatus::Completed,
    ExecutionStatus::DeployFailed,
    ExecutionStatus::RunFailed,
    ExecutionStatus::RunAborted,
    ExecutionStatus::RunTimedOut,
    ExecutionStatus::Unknown,
];

impl ExecutionStatus {
    /// Whether this status is in the terminal set.
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATUSES.contains(&self)
    }

    /// Normalize a status string reported by the remote fleet.
    ///
    /// The remote's `UPDATE` is an in-progress heartbeat and maps to
    /// [`ExecutionStatus::Running`]. Returns `None` for anything outside
    /// the vocabulary.
    pub fn from_remote(raw: &str) -> Option<Self> {
        match raw.trim() {
            "UPDATE" => Some(ExecutionStatus::Running),
            other => Self::ALL.iter().copied().find(|s| s.as_str() == other),
        }
    }

    /// Database IDs of the terminal set, for `NOT IN` guards.
    pub fn terminal_ids() -> Vec<StatusId> {
        TERMINAL_STATUSES.iter().map(|s| s.id()).collect()
    }
}
