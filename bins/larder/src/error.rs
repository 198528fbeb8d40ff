//! Command errors and their exit codes

use larder_core::entity::EntityId;
use larder_core::error::{exit_codes, ErrorCode};
use larder_core::state::{FailureKind, RefreshFailure};
use larder_remote::RemoteError;
use larder_store::StoreError;
use larder_sync::SyncError;
use thiserror::Error;

/// Failures a command reports that are not errors of a library crate
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("refresh failed: {0}")]
    Refresh(#[from] RefreshFailure),

    #[error("no cached entity with id {0}")]
    NotFound(EntityId),

    #[error("scheduler stopped unexpectedly")]
    SchedulerStopped,
}

/// Exit code for an error, from the first recognised cause in its chain
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CommandError>() {
            return match e {
                CommandError::Refresh(failure) => failure_code(failure.kind),
                CommandError::NotFound(_) | CommandError::SchedulerStopped => {
                    exit_codes::FAILURE
                }
            };
        }
        if let Some(e) = cause.downcast_ref::<larder_core::Error>() {
            return core_code(e.code);
        }
        if cause.downcast_ref::<StoreError>().is_some() {
            return exit_codes::STORAGE_ERROR;
        }
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            return match e {
                SyncError::Journal(e) => core_code(e.code),
                SyncError::Store(_) | SyncError::Worker(_) => exit_codes::STORAGE_ERROR,
            };
        }
        if let Some(e) = cause.downcast_ref::<RemoteError>() {
            return core_code(e.code());
        }
    }
    exit_codes::FAILURE
}

fn failure_code(kind: FailureKind) -> i32 {
    match kind {
        FailureKind::Network => exit_codes::NETWORK_ERROR,
        FailureKind::Parse => exit_codes::PARSE_ERROR,
        FailureKind::Storage => exit_codes::STORAGE_ERROR,
    }
}

fn core_code(code: ErrorCode) -> i32 {
    match code.code() / 1000 {
        3 => exit_codes::CONFIG_ERROR,
        4 => exit_codes::NETWORK_ERROR,
        5 => exit_codes::PARSE_ERROR,
        6 => exit_codes::STORAGE_ERROR,
        7 => exit_codes::VALIDATION_ERROR,
        _ => exit_codes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_refresh_failure_codes() {
        let err = anyhow::Error::from(CommandError::from(RefreshFailure::parse("bad body")));
        assert_eq!(exit_code(&err), exit_codes::PARSE_ERROR);

        let err = anyhow::Error::from(CommandError::from(RefreshFailure::network("down")));
        assert_eq!(exit_code(&err), exit_codes::NETWORK_ERROR);
    }

    #[test]
    fn test_code_found_through_context() {
        let err = Err::<(), _>(larder_core::Error::config_not_found("larder.toml"))
            .context("Loading configuration")
            .unwrap_err();
        assert_eq!(exit_code(&err), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_validation_errors() {
        let err = anyhow::Error::from(larder_core::Error::validation("remote.base_url is required"));
        assert_eq!(exit_code(&err), exit_codes::VALIDATION_ERROR);
    }

    #[test]
    fn test_remote_errors() {
        let err = anyhow::Error::from(RemoteError::Config("base_url cannot be empty".into()));
        assert_eq!(exit_code(&err), exit_codes::CONFIG_ERROR);

        let err = anyhow::Error::from(RemoteError::status(502, "bad gateway"));
        assert_eq!(exit_code(&err), exit_codes::NETWORK_ERROR);

        let err = anyhow::Error::from(RemoteError::payload("expected an array"));
        assert_eq!(exit_code(&err), exit_codes::PARSE_ERROR);
    }

    #[test]
    fn test_scheduler_stopped_is_failure() {
        let err = anyhow::Error::from(CommandError::SchedulerStopped);
        assert_eq!(exit_code(&err), exit_codes::FAILURE);
    }

    #[test]
    fn test_unknown_error_is_failure() {
        assert_eq!(exit_code(&anyhow::anyhow!("something else")), exit_codes::FAILURE);
    }
}
