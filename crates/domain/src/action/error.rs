use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{action}: Invalid {field}: {value}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Unsupported flow action: {0}")]
    Unsupported(&'static str),
}

impl ActionError {
    pub(crate) fn invalid(action: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::InvalidField {
            action,
            field,
            value: value.to_string(),
        }
    }
}

impl From<ActionError> for DomainError {
    fn from(e: ActionError) -> Self {
        DomainError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_is_bad_request() {
        let err: DomainError = ActionError::Unsupported("drop").into();
        assert!(err.is_bad_request());
        assert_eq!(err.to_string(), "bad request: Unsupported flow action: drop");
    }
}
