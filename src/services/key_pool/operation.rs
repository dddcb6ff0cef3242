//! Key-taking operations
//!
//! `KeyOperation` is the seam between the pool and whatever uses a key
//! (an HTTP call to a generation API, a file upload, ...). The pool only
//! knows that it hands over a key and gets back a result or an error.

use super::key::ApiKeyInfo;
use async_trait::async_trait;
use std::future::Future;

/// An async operation performed with one API key
#[async_trait]
pub trait KeyOperation<T>: Send + Sync {
    async fn call(&self, key: ApiKeyInfo) -> anyhow::Result<T>;
}

#[async_trait]
impl<T, F, Fut> KeyOperation<T> for F
where
    T: Send + 'static,
    F: Fn(ApiKeyInfo) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
{
    async fn call(&self, key: ApiKeyInfo) -> anyhow::Result<T> {
        (self)(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl KeyOperation<String> for Echo {
        async fn call(&self, key: ApiKeyInfo) -> anyhow::Result<String> {
            Ok(format!("echo-{}", key.alias()))
        }
    }

    #[tokio::test]
    async fn test_closure_operation() {
        let op = |key: ApiKeyInfo| async move { Ok::<_, anyhow::Error>(key.key().len()) };
        let len = KeyOperation::call(&op, ApiKeyInfo::new("abcd", "a")).await.unwrap();
        assert_eq!(len, 4);
    }

    #[tokio::test]
    async fn test_struct_operation() {
        let op: &dyn KeyOperation<String> = &Echo;
        let out = op.call(ApiKeyInfo::new("k", "prod")).await.unwrap();
        assert_eq!(out, "echo-prod");
    }
}
