//! Error taxonomy for the create-room workflow.
//!
//! Two kinds of failure stop a room from being created: the form itself is
//! not ready (caught locally, never reaches the service), or the service
//! rejects the request. Service rejections are classified so the two alias
//! problems the user can fix get a friendly message and mark the address
//! invalid, while anything else is shown verbatim.

use thiserror::Error;

use crate::service::ServiceError;

/// Raw service message for an alias with characters the server refuses.
pub const INVALID_ALIAS_CHARACTERS: &str = "M_UNKNOWN: Invalid characters in room alias";
/// Raw service message for an alias someone already claimed.
pub const ALIAS_IN_USE: &str = "M_ROOM_IN_USE: Room alias already taken";

/// Shown when the availability query itself fails.
pub const ALIAS_CHECK_FAILED: &str = "Could not verify room address availability";

/// Why a submit was refused before any request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocalValidationError {
    #[error("Room name is required")]
    MissingName,
    #[error("Room address is not available")]
    AddressUnavailable,
}

/// Why a submission failed, in the words shown to the user.
///
/// `Display` (generated by `thiserror` from the `#[error]` attributes) is the
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Local(#[from] LocalValidationError),
    #[error("ERROR: Invalid characters in room address")]
    InvalidAliasCharacters,
    #[error("ERROR: Room address is already in use")]
    AliasInUse,
    /// Any other service failure, carried through unchanged.
    #[error("{0}")]
    Unclassified(String),
}

impl SubmitError {
    /// Map a service failure onto the taxonomy by its exact message.
    pub fn classify(err: &ServiceError) -> Self {
        let raw = err.to_string();
        match raw.as_str() {
            INVALID_ALIAS_CHARACTERS => Self::InvalidAliasCharacters,
            ALIAS_IN_USE => Self::AliasInUse,
            _ => Self::Unclassified(raw),
        }
    }

    /// Whether this failure means the chosen address can't be used.
    pub fn invalidates_alias(&self) -> bool {
        matches!(self, Self::InvalidAliasCharacters | Self::AliasInUse)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invalid_characters() {
        let err = ServiceError::new("M_UNKNOWN", "Invalid characters in room alias");
        let classified = SubmitError::classify(&err);
        assert_eq!(classified, SubmitError::InvalidAliasCharacters);
        assert!(classified.invalidates_alias());
        assert_eq!(
            classified.to_string(),
            "ERROR: Invalid characters in room address"
        );
    }

    #[test]
    fn classifies_alias_in_use() {
        let err = ServiceError::new("M_ROOM_IN_USE", "Room alias already taken");
        let classified = SubmitError::classify(&err);
        assert_eq!(classified, SubmitError::AliasInUse);
        assert_eq!(classified.to_string(), "ERROR: Room address is already in use");
    }

    #[test]
    fn unknown_errors_pass_through_verbatim() {
        let err = ServiceError::new("M_FORBIDDEN", "You are not allowed to create rooms");
        let classified = SubmitError::classify(&err);
        assert!(!classified.invalidates_alias());
        assert_eq!(
            classified.to_string(),
            "M_FORBIDDEN: You are not allowed to create rooms"
        );
    }

    #[test]
    fn same_errcode_with_other_message_is_unclassified() {
        // Only the exact sentinel strings are recognized.
        let err = ServiceError::new("M_UNKNOWN", "Internal server error");
        assert!(matches!(
            SubmitError::classify(&err),
            SubmitError::Unclassified(_)
        ));
    }

    #[test]
    fn local_errors_display_their_own_message() {
        let err: SubmitError = LocalValidationError::MissingName.into();
        assert_eq!(err.to_string(), "Room name is required");
    }
}
