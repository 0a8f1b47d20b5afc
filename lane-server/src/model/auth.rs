//! Username and password authentication

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::model::store::{self, Store};
use crate::model::users::User;

#[derive(Debug, Error)]
pub enum Error {
    /// Reported for both unknown users and wrong passwords
    #[error("invalid username or password")]
    Authentication,
    #[error("user already exists")]
    Conflict,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Storage(store::Error),
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        match err {
            store::Error::Conflict => Self::Conflict,
            err => Self::Storage(err),
        }
    }
}

/// Verifies credentials and registers new users
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn Store>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Checks user credentials, returning the user on success
    ///
    /// Passwords are compared verbatim with the stored ones.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let user = match self.store.user_by_username(username).await {
            Ok(user) => user,
            Err(store::Error::NotFound) => {
                debug!("Unknown user");
                return Err(Error::Authentication);
            }
            Err(err) => return Err(Error::Storage(err)),
        };

        if user.password != password {
            debug!("Password mismatch");
            return Err(Error::Authentication);
        }

        info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Registers a new user
    ///
    /// Any non-empty password is accepted.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, username: &str, password: &str) -> Result<User, Error> {
        if username.is_empty() {
            return Err(Error::Validation("username is required"));
        }
        if password.is_empty() {
            return Err(Error::Validation("password is required"));
        }

        if self.store.user_exists(username).await? {
            debug!("Username taken");
            return Err(Error::Conflict);
        }

        let user = self.store.create_user(username, password).await?;
        info!(user_id = %user.id, "User signed up");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::tests::sqlite;

    async fn setup() -> (Authenticator, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(sqlite().await);
        (Authenticator::new(store.clone()), store)
    }

    #[tokio::test]
    async fn signup_then_login() {
        let (auth, _) = setup().await;

        let user = auth.signup("user1", "password1").await.unwrap();
        assert_eq!(user.username, "user1");

        let logged = auth.login("user1", "password1").await.unwrap();
        assert_eq!(logged.id, user.id);

        let other = auth.signup("user2", "password2").await.unwrap();
        assert_ne!(other.id, user.id);
        assert_eq!(auth.login("user2", "password2").await.unwrap().id, other.id);
    }

    #[tokio::test]
    async fn duplicate_signup_leaves_user_intact() {
        let (auth, store) = setup().await;

        let user = auth.signup("user1", "password1").await.unwrap();
        assert!(matches!(
            auth.signup("user1", "other password").await,
            Err(Error::Conflict)
        ));

        assert_eq!(store.user_by_username("user1").await.unwrap(), user);
        auth.login("user1", "password1").await.unwrap();
        let _ = auth.login("user1", "other password").await.unwrap_err();
    }

    #[tokio::test]
    async fn login_failures_indistinguishable() {
        let (auth, _) = setup().await;
        auth.signup("user1", "password1").await.unwrap();

        let wrong_password = auth.login("user1", "password2").await.unwrap_err();
        let unknown_user = auth.login("user2", "password1").await.unwrap_err();

        assert!(matches!(wrong_password, Error::Authentication));
        assert!(matches!(unknown_user, Error::Authentication));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.to_string(), "invalid username or password");
    }

    #[tokio::test]
    async fn password_compared_exactly() {
        let (auth, _) = setup().await;
        auth.signup("user1", "Password1").await.unwrap();

        let _ = auth.login("user1", "password1").await.unwrap_err();
        let _ = auth.login("user1", "Password1 ").await.unwrap_err();
        let _ = auth.login("user1", "").await.unwrap_err();
    }

    #[tokio::test]
    async fn empty_credentials_rejected() {
        let (auth, store) = setup().await;

        assert!(matches!(
            auth.signup("", "password").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            auth.signup("user1", "").await,
            Err(Error::Validation(_))
        ));
        assert!(!store.user_exists("user1").await.unwrap());
    }
}
