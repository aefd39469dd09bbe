use crate::{
    auth::store::{Role, User},
    error::ApiError,
};

/// Role gate for protected operations. The allowed set is declared where
/// the route is declared; this only checks membership.
pub fn restrict_to(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "you do not have permission to perform this action".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user_with_role(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Marta".into(),
            email: "marta@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            role,
            password_changed_at: None,
            password_reset_token_hash: None,
            password_reset_expires: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn member_of_the_allowed_set_passes() {
        let user = user_with_role(Role::LeadGuide);
        assert!(restrict_to(&user, &[Role::Admin, Role::LeadGuide]).is_ok());
    }

    #[test]
    fn plain_user_is_forbidden_from_admin_operations() {
        let user = user_with_role(Role::User);
        let err = restrict_to(&user, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn empty_allowed_set_rejects_everyone() {
        let user = user_with_role(Role::Admin);
        assert!(restrict_to(&user, &[]).is_err());
    }
}
