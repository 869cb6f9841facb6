use std::sync::Arc;

use tracing::info;

use super::repo_types::User;

/// Callback run after a new user row has been stored.
pub type UserCreatedHook = Arc<dyn Fn(&User) + Send + Sync>;

pub fn default_user_hooks() -> Vec<UserCreatedHook> {
    vec![Arc::new(|user: &User| {
        info!(user_id = %user.id, username = %user.username, "user created");
    })]
}

pub fn run_user_created(hooks: &[UserCreatedHook], user: &User) {
    for hook in hooks {
        hook(user);
    }
}
