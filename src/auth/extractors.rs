use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{
        jwt::{JwtKeys, TokenError},
        store::{User, UserStore},
    },
    error::ApiError,
    state::AppState,
};

/// The authenticated user, re-resolved from the store on every request.
#[derive(Debug)]
pub struct CurrentUser(pub User);

/// Token-to-user resolution behind the extractor: verify the claim, check
/// the subject still exists, reject tokens issued before a later password
/// change.
pub(crate) async fn authenticate(
    token: &str,
    keys: &JwtKeys,
    store: &dyn UserStore,
) -> Result<User, ApiError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        match e {
            TokenError::Expired => {
                ApiError::Unauthorized("your session has expired, log in again".into())
            }
            TokenError::SignatureInvalid | TokenError::Malformed => {
                ApiError::Unauthorized("invalid token".into())
            }
        }
    })?;

    let user = store.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "token for deleted user");
        ApiError::Unauthorized("the user belonging to this token no longer exists".into())
    })?;

    if user.changed_password_after(claims.iat) {
        warn!(user_id = %user.id, "stale token after password change");
        return Err(ApiError::Unauthorized(
            "password recently changed, log in again".into(),
        ));
    }

    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("you are not logged in".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("invalid authorization scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let user = authenticate(token, &keys, state.store.as_ref()).await?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{NewUser, Role};
    use axum::http::{header::AUTHORIZATION, Request};
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn parts_with_header(value: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/users/me");
        if let Some(v) = value {
            builder = builder.header(AUTHORIZATION, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn state_with_user() -> (AppState, User) {
        let state = AppState::fake();
        let user = state
            .store
            .create(NewUser {
                name: "Marta".into(),
                email: "marta@example.com".into(),
                password_hash: "$argon2id$fake".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        (state, user)
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (state, _) = state_with_user().await;
        let mut parts = parts_with_header(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let (state, _) = state_with_user().await;
        let mut parts = parts_with_header(Some("Basic bWFydGE6cGFzcw==".into()));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn valid_token_resolves_the_user() {
        let (state, user) = state_with_user().await;
        let keys = JwtKeys::from_ref(&state);
        let token = keys.issue(user.id, OffsetDateTime::now_utc()).unwrap();
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let CurrentUser(resolved) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_rejected() {
        let (state, _) = state_with_user().await;
        let keys = JwtKeys::from_ref(&state);
        let token = keys
            .issue(Uuid::new_v4(), OffsetDateTime::now_utc())
            .unwrap();
        let err = authenticate(&token, &keys, state.store.as_ref())
            .await
            .unwrap_err();
        match err {
            ApiError::Unauthorized(msg) => assert!(msg.contains("no longer exists")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn password_change_invalidates_earlier_tokens() {
        let (state, mut user) = state_with_user().await;
        let keys = JwtKeys::from_ref(&state);
        let old_token = keys
            .issue(user.id, OffsetDateTime::now_utc() - Duration::seconds(10))
            .unwrap();

        user.password_changed_at = Some(OffsetDateTime::now_utc());
        let user = state.store.save(&user).await.unwrap();

        let err = authenticate(&old_token, &keys, state.store.as_ref())
            .await
            .unwrap_err();
        match err {
            ApiError::Unauthorized(msg) => assert!(msg.contains("recently changed")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }

        // A token stamped with the change itself still passes.
        let fresh = keys
            .issue(user.id, user.password_changed_at.unwrap())
            .unwrap();
        assert!(authenticate(&fresh, &keys, state.store.as_ref())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (state, user) = state_with_user().await;
        let keys = JwtKeys::from_ref(&state);
        // fake() config uses a 5 minute ttl
        let token = keys
            .issue(user.id, OffsetDateTime::now_utc() - Duration::minutes(6))
            .unwrap();
        let err = authenticate(&token, &keys, state.store.as_ref())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
