//! Driving port resolving bearer tokens into actors.
//!
//! Inbound adapters call it to authenticate a request without knowing where
//! identities are stored. Handler tests substitute the generated mock.

use async_trait::async_trait;

use crate::domain::Actor;

use super::define_port_error;

define_port_error! {
    /// Errors raised while resolving a token.
    pub enum ActorDirectoryError {
        /// The directory could not be read.
        Unavailable { message: String } => "actor directory unavailable: {message}",
    }
}

/// Port for looking up the actor behind a bearer token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Return the actor holding `token`, or `None` when it is unknown.
    async fn resolve(&self, token: &str) -> Result<Option<Actor>, ActorDirectoryError>;
}

/// Directory that knows no tokens; every request is a guest or rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyActorDirectory;

#[async_trait]
impl ActorDirectory for EmptyActorDirectory {
    async fn resolve(&self, _token: &str) -> Result<Option<Actor>, ActorDirectoryError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn empty_directory_resolves_nothing() {
        let resolved = EmptyActorDirectory.resolve("secret").await.expect("lookup");
        assert!(resolved.is_none());
    }
}
