use std::sync::{Arc, PoisonError, RwLock};

use progress_core::model::UserId;

/// Supplies the currently authenticated user, if any.
pub trait CurrentUserIdentity: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Identity slot shared between the auth layer and the engine.
#[derive(Clone, Default)]
pub struct SharedIdentity {
    current: Arc<RwLock<Option<UserId>>>,
}

impl SharedIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        let identity = Self::new();
        identity.sign_in(user);
        identity
    }

    pub fn sign_in(&self, user: UserId) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CurrentUserIdentity for SharedIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_slot() {
        let identity = SharedIdentity::new();
        let view = identity.clone();
        assert_eq!(view.current_user(), None);

        identity.sign_in(UserId::new("alice").unwrap());
        assert_eq!(view.current_user(), UserId::new("alice"));

        identity.sign_out();
        assert_eq!(view.current_user(), None);
    }
}
