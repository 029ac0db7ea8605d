use thiserror::Error;

/// Errors produced while expanding explorer nodes.
///
/// Payloads are rendered strings so that a single expansion result can be
/// handed to every caller waiting on the same in-flight expansion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExplorerError {
    #[error("Failed to get credentials, tenant {0} not found.")]
    SessionNotFound(String),

    #[error("Failed to acquire directory token for tenant {tenant}: {message}")]
    DirectoryToken { tenant: String, message: String },

    #[error("Registry request to {host} failed: {message}")]
    Registry { host: String, message: String },

    #[error("Unexpected response from {host}: {message}")]
    InvalidResponse { host: String, message: String },

    #[error("Management request failed: {0}")]
    Management(String),

    #[error("Expansion of {0} was superseded by a newer request")]
    Cancelled(String),
}

impl ExplorerError {
    /// Whether the failure should degrade the expansion to "no children"
    /// instead of propagating to the host.
    ///
    /// Session lookup and directory token failures point at a broken account
    /// state and must surface; everything on the wire is best-effort.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExplorerError::Registry { .. }
                | ExplorerError::InvalidResponse { .. }
                | ExplorerError::Management(_)
        )
    }

    pub(crate) fn registry(host: &str, err: impl std::fmt::Display) -> Self {
        ExplorerError::Registry {
            host: host.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_response(host: &str, err: impl std::fmt::Display) -> Self {
        ExplorerError::InvalidResponse {
            host: host.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn management(err: impl std::fmt::Display) -> Self {
        ExplorerError::Management(format!("{:#}", err))
    }

    /// Map a management-plane failure, keeping fatal explorer errors intact
    pub(crate) fn from_management(err: anyhow::Error) -> Self {
        match err.downcast::<ExplorerError>() {
            Ok(err) if !err.is_recoverable() => err,
            Ok(err) => ExplorerError::management(err),
            Err(err) => ExplorerError::management(err),
        }
    }
}

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lookup_failure_is_fatal() {
        let err = ExplorerError::SessionNotFound("tenant-a".to_string());
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Failed to get credentials, tenant tenant-a not found."
        );
    }

    #[test]
    fn test_wire_failures_are_recoverable() {
        assert!(ExplorerError::registry("r.azurecr.io", "connection refused").is_recoverable());
        assert!(ExplorerError::invalid_response("r.azurecr.io", "eof").is_recoverable());
        assert!(ExplorerError::management("boom").is_recoverable());
        assert!(!ExplorerError::DirectoryToken {
            tenant: "t".to_string(),
            message: "denied".to_string(),
        }
        .is_recoverable());
        assert!(!ExplorerError::Cancelled("node".to_string()).is_recoverable());
    }

    #[test]
    fn test_management_mapping_keeps_fatal_errors() {
        let directory = ExplorerError::DirectoryToken {
            tenant: "t".to_string(),
            message: "AADSTS700082".to_string(),
        };
        assert_eq!(
            ExplorerError::from_management(anyhow::Error::new(directory.clone())),
            directory
        );

        let err = ExplorerError::from_management(anyhow::anyhow!("status 503"));
        assert_eq!(err, ExplorerError::Management("status 503".to_string()));
        assert!(err.is_recoverable());
    }
}
