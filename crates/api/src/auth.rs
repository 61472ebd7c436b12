//! Bearer token authentication.
//!
//! Tokens are issued elsewhere. This module only maps a presented token to
//! the caller it was registered for; the store keeps the SHA-256 digest of
//! each token, never the token itself.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;
use document_store::{DocumentStore, WriteBatch};
use domain::{Caller, DomainError, Record, RecordBatch, Repository, Role};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::state::AppState;

/// Maps bearer tokens to callers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the caller for `token`, or `None` if the token is unknown.
    async fn authenticate(&self, token: &str) -> Result<Option<Caller>, DomainError>;
}

/// A registered token, keyed by its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiToken {
    pub token_hash: String,
    pub user_id: UserId,
    pub role: Role,
}

impl Record for ApiToken {
    const COLLECTION: &'static str = "api_tokens";
    const ENTITY: &'static str = "API token";

    fn document_id(&self) -> String {
        self.token_hash.clone()
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// [`Authenticator`] that looks token digests up in the document store.
pub struct DocumentTokenAuthenticator<S> {
    repo: Repository<S>,
}

impl<S: DocumentStore> DocumentTokenAuthenticator<S> {
    pub fn new(store: S) -> Self {
        Self {
            repo: Repository::new(store),
        }
    }

    /// Registers `token` for `caller`.
    pub async fn register_token(&self, token: &str, caller: Caller) -> Result<(), DomainError> {
        let record = ApiToken {
            token_hash: token_digest(token),
            user_id: caller.user_id,
            role: caller.role,
        };
        self.repo
            .commit(WriteBatch::new().insert_record(&record)?)
            .await
    }
}

#[async_trait]
impl<S: DocumentStore> Authenticator for DocumentTokenAuthenticator<S> {
    async fn authenticate(&self, token: &str) -> Result<Option<Caller>, DomainError> {
        Ok(self
            .repo
            .load::<ApiToken>(&token_digest(token))
            .await?
            .map(|t| Caller {
                user_id: t.record.user_id,
                role: t.record.role,
            }))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Extractor for the authenticated caller. Rejects with 401.
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<Arc<AppState<S>>> for Authenticated
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        match state.auth.authenticate(token).await? {
            Some(caller) => Ok(Authenticated(caller)),
            None => {
                tracing::debug!("unknown bearer token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;

    #[tokio::test]
    async fn registered_token_resolves_to_caller() {
        let auth = DocumentTokenAuthenticator::new(InMemoryDocumentStore::new());
        let caller = Caller::admin(UserId::new());
        auth.register_token("tok-1", caller).await.unwrap();

        assert_eq!(auth.authenticate("tok-1").await.unwrap(), Some(caller));
        assert_eq!(auth.authenticate("tok-2").await.unwrap(), None);
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_header_parsing() {
        let (mut parts, _) = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer  tok ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("tok"));

        parts
            .headers
            .insert(AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&parts), None);
    }
}
