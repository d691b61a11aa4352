use thiserror::Error;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::PatientId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::Auth(err.to_string())
    }
}

/// Turns a validated token subject into the acting patient's numeric id.
pub fn resolve_patient_id(user: &User) -> Result<PatientId, IdentityError> {
    let subject = user.id.trim();
    if subject.is_empty() {
        return Err(IdentityError::Unauthenticated("token carries no subject".to_string()));
    }

    match subject.parse::<PatientId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(IdentityError::InvalidIdentity(format!(
            "subject {:?} is not a numeric patient id",
            subject
        ))),
    }
}
