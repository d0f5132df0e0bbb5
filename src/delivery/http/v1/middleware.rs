use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use uuid::Uuid;

use crate::domain::user::{Actor, Role, UserId};
use crate::usecase::error::UsecaseError;
use crate::{usecase::jwt::TokenType, AppState};

/// Roles allowed to author and manage notices.
pub const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin];

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| {
            tracing::warn!("missing or invalid authorization header");
            UsecaseError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!(?e, "invalid token");
        UsecaseError::Unauthorized(format!("Invalid token: {}", e))
    })?;

    // Ensure it's an access token, not a refresh token
    if claims.token_type != TokenType::Access {
        tracing::warn!("attempted to use non-access token for authentication");
        return Err(UsecaseError::Unauthorized("Invalid token type".to_string()));
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        tracing::warn!(?e, "failed to parse user_id from token");
        UsecaseError::Unauthorized("Invalid user ID in token".to_string())
    })?;

    let authenticated_user = AuthenticatedUser {
        user_id: UserId(user_id),
        email: claims.email,
        role: claims.role,
    };

    tracing::debug!(
        user_id = %authenticated_user.user_id,
        email = %authenticated_user.email,
        role = %authenticated_user.role,
        "user authenticated successfully"
    );
    request.extensions_mut().insert(authenticated_user);

    Ok(next.run(request).await)
}

pub(crate) fn require_role(user: &AuthenticatedUser, allowed: &[Role]) -> Result<(), UsecaseError> {
    if !allowed.contains(&user.role) {
        tracing::warn!(user_id = %user.user_id, role = %user.role, "role not permitted for endpoint");
        return Err(UsecaseError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            user.role
        )));
    }
    Ok(())
}

/// Capability gate for notice management; must run after `auth_middleware`.
pub async fn staff_only(
    Extension(user): Extension<AuthenticatedUser>,
    request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    require_role(&user, STAFF_ROLES)?;
    Ok(next.run(request).await)
}
