pub mod extractor;
pub mod identity;
pub mod jwt;
pub mod test_utils;

pub use extractor::{auth_middleware, AuthenticatedPatient};
pub use identity::{resolve_patient_id, IdentityError};
