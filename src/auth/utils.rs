use crate::{
    auth::AccessClaims,
    errors::{AppError, AppResult},
    models::domain::UserRole,
};

pub fn require_role(claims: &AccessClaims, allowed: &[UserRole]) -> AppResult<()> {
    if !allowed.contains(&claims.role) {
        return Err(AppError::Forbidden(
            "Insufficient permissions".to_string(),
        ));
    }
    Ok(())
}
