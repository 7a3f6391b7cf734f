use thiserror::Error;

use super::audio_models::ChannelRole;

/// Step of channel bring-up that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStage {
    Create,
    ConfigureStdMode,
    Enable,
}

impl std::fmt::Display for AllocationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::ConfigureStdMode => "configure std mode",
            Self::Enable => "enable",
        };
        f.write_str(name)
    }
}

/// Why a single read or write did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Timeout,
    Io,
}

/// Errors produced by the loopback service and its channel drivers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoopbackError {
    /// A channel could not be created, put into standard mode, or enabled.
    /// Fatal to the initialize/reinitialize attempt.
    #[error("failed to {stage} {role} channel (driver error {code})")]
    ChannelAllocation {
        role: ChannelRole,
        stage: AllocationStage,
        code: i32,
    },

    /// One read or write failed. The worker skips the iteration and keeps going.
    #[error("{role} transfer failed: {kind:?} (driver error {code})")]
    Transfer {
        role: ChannelRole,
        kind: TransferKind,
        code: i32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to spawn loop task: {0}")]
    TaskSpawn(String),
}

impl LoopbackError {
    /// Whether the error only affects a single loop iteration.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }

    pub fn is_allocation(&self) -> bool {
        matches!(self, Self::ChannelAllocation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_message_names_role_and_stage() {
        let err = LoopbackError::ChannelAllocation {
            role: ChannelRole::Capture,
            stage: AllocationStage::Enable,
            code: 259,
        };
        assert_eq!(err.to_string(), "failed to enable capture channel (driver error 259)");
        assert!(err.is_allocation());
        assert!(!err.is_transfer());
    }

    #[test]
    fn transfer_errors_are_recoverable() {
        let err = LoopbackError::Transfer {
            role: ChannelRole::Playback,
            kind: TransferKind::Timeout,
            code: 263,
        };
        assert!(err.is_transfer());
        assert!(err.to_string().starts_with("playback transfer failed"));
    }
}
