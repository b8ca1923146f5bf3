use serde_json::{json, Map};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, validate_password, verify_dummy, verify_password, PasswordError},
    },
    error::AppError,
    users::repo::{NewUser, StoreError, User, UserStore},
};

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Checks credentials and issues a token with `sub = username`, `{id}` payload.
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<String, AppError> {
    let (Some(username), Some(password)) = (present(req.username), present(req.password)) else {
        return Err(AppError::MissingCredentials);
    };

    let Some(user) = store.find_by_username(&username).await? else {
        if let Err(e) = verify_dummy(&password).await {
            error!(error = %e, "dummy password verification failed");
        }
        warn!(%username, "login unknown username");
        return Err(AppError::AuthFailure);
    };

    match verify_password(&password, &user.password).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(%username, user_id = user.id, "login invalid password");
            return Err(AppError::AuthFailure);
        }
        // an unreadable stored hash must look like any other bad login
        Err(PasswordError::Hash(e)) => {
            error!(error = %e, %username, user_id = user.id, "stored password hash unreadable");
            return Err(AppError::AuthFailure);
        }
        Err(e) => return Err(e.into()),
    }

    let mut payload = Map::new();
    payload.insert("id".into(), json!(user.id));
    let token = keys
        .issue(&user.username, payload)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(user_id = user.id, %username, "user logged in");
    Ok(token)
}

/// Validates the registration form, then stores the user with a hashed password.
pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<User, AppError> {
    let username = present(req.username).ok_or(AppError::MissingField("username"))?;
    let password = present(req.password).ok_or(AppError::MissingField("password"))?;
    let age = req.age.ok_or(AppError::MissingField("age"))?;
    let height = req.height.ok_or(AppError::MissingField("height"))?;
    let userweight = req.userweight.ok_or(AppError::MissingField("userweight"))?;

    if let Err(violation) = validate_password(&password) {
        debug!(%username, %violation, "password rejected");
        return Err(violation.into());
    }

    if store.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already taken");
        return Err(AppError::UsernameTaken);
    }

    let password_hash = hash_password(&password).await?;
    let user = store
        .insert(NewUser {
            username,
            password_hash,
            age,
            height,
            userweight,
        })
        .await
        .map_err(|e| match e {
            // lost a race with a concurrent registration
            StoreError::UniqueViolation => AppError::UsernameTaken,
            other => AppError::StoreUnavailable(other),
        })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Resolves an `Authorization` header value to an identity without touching the store.
pub fn resolve_bearer(keys: &JwtKeys, header: Option<&str>) -> Result<AuthUser, AppError> {
    let header = header.ok_or(AppError::Unauthenticated)?;
    let token = header
        .strip_prefix("bearer ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "bearer token rejected");
        AppError::Unauthenticated
    })?;

    let id = claims
        .payload
        .get("id")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            warn!(subject = %claims.sub, "token has no usable id claim");
            AppError::Unauthenticated
        })?;

    Ok(AuthUser {
        id,
        username: claims.sub,
    })
}
