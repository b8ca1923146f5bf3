use tracing::{info, warn};

use crate::{
    auth::services::AuthUser,
    error::AppError,
    users::repo::{StatsPatch, User, UserStore},
};

/// Applies a partial stat update to the authenticated user's row.
pub async fn update_stats(
    store: &dyn UserStore,
    who: &AuthUser,
    patch: StatsPatch,
) -> Result<User, AppError> {
    if patch.is_empty() {
        return Err(AppError::EmptyStatsUpdate);
    }
    match store.update_stats(who.id, &who.username, patch).await? {
        Some(user) => {
            info!(user_id = user.id, "user stats updated");
            Ok(user)
        }
        None => {
            // valid signature, but the subject no longer maps to a row
            warn!(user_id = who.id, username = %who.username, "stats update for unknown user");
            Err(AppError::Unauthenticated)
        }
    }
}

pub async fn current_user(store: &dyn UserStore, who: &AuthUser) -> Result<User, AppError> {
    store
        .find_by_id(who.id)
        .await?
        .filter(|u| u.username == who.username)
        .ok_or_else(|| {
            warn!(user_id = who.id, username = %who.username, "token subject not found");
            AppError::Unauthenticated
        })
}
