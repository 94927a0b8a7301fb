//! Request extractors.
//!
//! [`ValidJson`] and [`ValidQuery`] turn axum's plain-text rejections into
//! envelope errors. [`AuthUser`] resolves the bearer token to an active user.

use auth::Claims;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use database::{DatabaseError, User};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::AppState;

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// JSON body extractor that rejects with a 400 envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ApiError::invalid("body", rejection.body_text())),
        }
    }
}

/// Query string extractor that rejects with a 400 envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidQuery(value)),
            Err(rejection) => Err(ApiError::invalid("query", rejection.body_text())),
        }
    }
}

/// The authenticated caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::unauthorized("访问令牌缺失", "authorization", "请在请求头中提供有效的访问令牌")
        })?;

        let claims = state.tokens.verify_access(token).map_err(|err| {
            tracing::debug!(error = %err, "Access token rejected");
            ApiError::unauthorized("访问令牌无效", "token", "访问令牌格式错误或已过期")
        })?;

        if state.revoked.is_revoked(&claims.jti) {
            return Err(ApiError::unauthorized("访问令牌无效", "token", "访问令牌已注销"));
        }

        let user = match state.users.get_user(&claims.user_id).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound { .. }) => {
                return Err(ApiError::unauthorized("用户不存在", "token", "访问令牌无效或已过期"));
            }
            Err(err) => return Err(err.into()),
        };

        if !user.is_active {
            return Err(ApiError::forbidden("账户已被禁用", "account", "您的账户已被禁用，请联系管理员"));
        }

        Ok(AuthUser { user, claims })
    }
}
