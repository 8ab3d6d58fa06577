//! Provider account resolution
//!
//! Every capability object talks to one tenant of the portal. Which tenant is
//! decided by an ordered chain of [`AccountLookup`] strategies:
//!
//! 1. The object's explicit `providerAccountRef` secret. Once named, the
//!    secret and both of its fields are required.
//! 2. The namespace's default provider account secret. Absence falls through;
//!    presence makes both fields required.
//! 3. An APIManager installed in the namespace. The admin URL is synthesized
//!    from its tenant and wildcard domain; the token comes from the seed
//!    secret. A missing seed secret falls through.
//!
//! When no strategy produces credentials the resolver returns
//! [`Error::NoProviderAccount`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use apiary_common::crd::{ApiManager, LocalSecretRef, ProviderAccountScoped};
use apiary_common::{
    Error, DEFAULT_PROVIDER_ACCOUNT_SECRET, PROVIDER_ACCOUNT_ADMIN_URL_FIELD,
    PROVIDER_ACCOUNT_TOKEN_FIELD, SYSTEM_SEED_ADMIN_ACCESS_TOKEN_FIELD, SYSTEM_SEED_SECRET,
};
use apiary_reconcile::ObjectStore;

use crate::Result;

/// Tenant admin URL plus access token
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    /// Admin portal base URL
    pub admin_url: String,
    /// Access token
    pub token: String,
}

impl fmt::Debug for ProviderAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAccount")
            .field("admin_url", &self.admin_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ProviderAccount {
    /// Whether two accounts address the same tenant
    ///
    /// Admin URLs are compared exactly, as written in the secrets.
    pub fn same_tenant(&self, admin_url: &str) -> bool {
        self.admin_url == admin_url
    }
}

/// Read access to the objects the resolver consults
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch a secret; `None` when it does not exist
    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// List APIManager installations in a namespace
    async fn api_managers(&self, namespace: &str) -> Result<Vec<ApiManager>>;
}

/// [`SecretSource`] over any object store serving secrets and APIManagers
pub struct KubeSecretSource<S> {
    store: S,
}

impl<S> KubeSecretSource<S> {
    /// Wrap a store
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> SecretSource for KubeSecretSource<S>
where
    S: ObjectStore<Secret> + ObjectStore<ApiManager>,
{
    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        ObjectStore::<Secret>::get(&self.store, namespace, name).await
    }

    async fn api_managers(&self, namespace: &str) -> Result<Vec<ApiManager>> {
        ObjectStore::<ApiManager>::list(&self.store, namespace).await
    }
}

/// Value of a secret's `data` field, if present
pub fn secret_field(secret: &Secret, field: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(field))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
}

fn required_field(secret: &Secret, namespace: &str, field: &str) -> Result<String> {
    secret_field(secret, field).ok_or_else(|| {
        Error::precondition(
            format!("secret {namespace}/{}", secret.name_any()),
            format!("secret field '{field}' is required"),
        )
    })
}

fn account_from_secret(secret: &Secret, namespace: &str) -> Result<ProviderAccount> {
    Ok(ProviderAccount {
        admin_url: required_field(secret, namespace, PROVIDER_ACCOUNT_ADMIN_URL_FIELD)?,
        token: required_field(secret, namespace, PROVIDER_ACCOUNT_TOKEN_FIELD)?,
    })
}

/// One way of finding a tenant's credentials
///
/// `Ok(None)` passes to the next strategy; an error stops the chain.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Try to produce credentials
    async fn lookup(
        &self,
        source: &dyn SecretSource,
        namespace: &str,
        account_ref: Option<&LocalSecretRef>,
    ) -> Result<Option<ProviderAccount>>;
}

/// Credentials from the object's own secret reference
pub struct ExplicitSecretLookup;

#[async_trait]
impl AccountLookup for ExplicitSecretLookup {
    fn name(&self) -> &'static str {
        "explicit-secret"
    }

    async fn lookup(
        &self,
        source: &dyn SecretSource,
        namespace: &str,
        account_ref: Option<&LocalSecretRef>,
    ) -> Result<Option<ProviderAccount>> {
        let Some(account_ref) = account_ref else {
            return Ok(None);
        };
        let secret = source
            .secret(namespace, &account_ref.name)
            .await?
            .ok_or_else(|| Error::not_found("Secret", format!("{namespace}/{}", account_ref.name)))?;
        account_from_secret(&secret, namespace).map(Some)
    }
}

/// Credentials from the namespace's conventional secret
pub struct DefaultSecretLookup;

#[async_trait]
impl AccountLookup for DefaultSecretLookup {
    fn name(&self) -> &'static str {
        "default-secret"
    }

    async fn lookup(
        &self,
        source: &dyn SecretSource,
        namespace: &str,
        _account_ref: Option<&LocalSecretRef>,
    ) -> Result<Option<ProviderAccount>> {
        match source.secret(namespace, DEFAULT_PROVIDER_ACCOUNT_SECRET).await? {
            Some(secret) => account_from_secret(&secret, namespace).map(Some),
            None => Ok(None),
        }
    }
}

/// Credentials of the default tenant of an in-namespace installation
pub struct ApiManagerLookup;

#[async_trait]
impl AccountLookup for ApiManagerLookup {
    fn name(&self) -> &'static str {
        "apimanager"
    }

    async fn lookup(
        &self,
        source: &dyn SecretSource,
        namespace: &str,
        _account_ref: Option<&LocalSecretRef>,
    ) -> Result<Option<ProviderAccount>> {
        let managers = source.api_managers(namespace).await?;
        let Some(manager) = managers.first() else {
            return Ok(None);
        };
        let admin_url = manager.spec.tenant_admin_url().ok_or_else(|| {
            Error::precondition(
                format!("apimanager {namespace}/{}", manager.name_any()),
                "tenantName is empty",
            )
        })?;

        let Some(seed) = source.secret(namespace, SYSTEM_SEED_SECRET).await? else {
            debug!(namespace = %namespace, "apimanager found without seed secret");
            return Ok(None);
        };
        let token = required_field(&seed, namespace, SYSTEM_SEED_ADMIN_ACCESS_TOKEN_FIELD)?;
        Ok(Some(ProviderAccount { admin_url, token }))
    }
}

/// Ordered chain of [`AccountLookup`] strategies
pub struct ProviderAccountResolver {
    source: Arc<dyn SecretSource>,
    strategies: Vec<Box<dyn AccountLookup>>,
}

impl ProviderAccountResolver {
    /// Resolver with the standard chain: explicit ref, default secret, APIManager
    pub fn new(source: Arc<dyn SecretSource>) -> Self {
        Self::with_strategies(
            source,
            vec![
                Box::new(ExplicitSecretLookup),
                Box::new(DefaultSecretLookup),
                Box::new(ApiManagerLookup),
            ],
        )
    }

    /// Resolver with a custom chain
    pub fn with_strategies(
        source: Arc<dyn SecretSource>,
        strategies: Vec<Box<dyn AccountLookup>>,
    ) -> Self {
        Self { source, strategies }
    }

    /// Strategy names in evaluation order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve credentials for a namespace and optional explicit secret
    pub async fn resolve(
        &self,
        namespace: &str,
        account_ref: Option<&LocalSecretRef>,
    ) -> Result<ProviderAccount> {
        for strategy in &self.strategies {
            let found = strategy
                .lookup(self.source.as_ref(), namespace, account_ref)
                .await?;
            if let Some(account) = found {
                info!(
                    namespace = %namespace,
                    strategy = strategy.name(),
                    admin_url = %account.admin_url,
                    "provider account resolved"
                );
                return Ok(account);
            }
        }
        Err(Error::NoProviderAccount {
            namespace: namespace.to_string(),
        })
    }

    /// Resolve credentials for an object
    pub async fn resolve_for<K>(&self, obj: &K) -> Result<ProviderAccount>
    where
        K: ProviderAccountScoped + ResourceExt,
    {
        let namespace = obj.namespace().unwrap_or_default();
        self.resolve(&namespace, obj.provider_account_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_common::crd::ApiManagerSpec;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(name: &str, fields: &[(&str, &str)]) -> Secret {
        let data: BTreeMap<String, ByteString> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        let mut secret = Secret {
            data: Some(data),
            ..Default::default()
        };
        secret.metadata.name = Some(name.to_string());
        secret
    }

    fn account_secret(name: &str, url: &str) -> Secret {
        secret(
            name,
            &[
                (PROVIDER_ACCOUNT_ADMIN_URL_FIELD, url),
                (PROVIDER_ACCOUNT_TOKEN_FIELD, "tok"),
            ],
        )
    }

    fn api_manager(tenant: Option<&str>) -> ApiManager {
        ApiManager::new(
            "apimanager",
            ApiManagerSpec {
                wildcard_domain: "apps.example.com".to_string(),
                tenant_name: tenant.map(str::to_string),
            },
        )
    }

    /// Source with the given secrets and APIManagers
    fn source(secrets: Vec<Secret>, managers: Vec<ApiManager>) -> Arc<dyn SecretSource> {
        let mut mock = MockSecretSource::new();
        mock.expect_secret().returning(move |_, name| {
            Ok(secrets
                .iter()
                .find(|s| s.metadata.name.as_deref() == Some(name))
                .cloned())
        });
        mock.expect_api_managers()
            .returning(move |_| Ok(managers.clone()));
        Arc::new(mock)
    }

    fn explicit(name: &str) -> LocalSecretRef {
        LocalSecretRef {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn explicit_ref_wins_over_default_secret() {
        let resolver = ProviderAccountResolver::new(source(
            vec![
                account_secret("mine", "https://mine-admin.example.com"),
                account_secret(DEFAULT_PROVIDER_ACCOUNT_SECRET, "https://default.example.com"),
            ],
            vec![],
        ));
        let account = resolver.resolve("ns", Some(&explicit("mine"))).await.unwrap();
        assert_eq!(account.admin_url, "https://mine-admin.example.com");
    }

    #[tokio::test]
    async fn missing_explicit_secret_does_not_fall_through() {
        let resolver = ProviderAccountResolver::new(source(
            vec![account_secret(DEFAULT_PROVIDER_ACCOUNT_SECRET, "https://default.example.com")],
            vec![],
        ));
        let err = resolver.resolve("ns", Some(&explicit("gone"))).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn explicit_secret_requires_both_fields() {
        let resolver = ProviderAccountResolver::new(source(
            vec![secret("partial", &[(PROVIDER_ACCOUNT_ADMIN_URL_FIELD, "https://x")])],
            vec![],
        ));
        let err = resolver
            .resolve("ns", Some(&explicit("partial")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'token' is required"));
    }

    #[tokio::test]
    async fn default_secret_is_used_without_ref() {
        let resolver = ProviderAccountResolver::new(source(
            vec![account_secret(DEFAULT_PROVIDER_ACCOUNT_SECRET, "https://default.example.com")],
            vec![api_manager(Some("acme"))],
        ));
        let account = resolver.resolve("ns", None).await.unwrap();
        assert_eq!(account.admin_url, "https://default.example.com");
        assert_eq!(account.token, "tok");
    }

    #[tokio::test]
    async fn api_manager_is_the_last_resort() {
        let resolver = ProviderAccountResolver::new(source(
            vec![secret(SYSTEM_SEED_SECRET, &[(SYSTEM_SEED_ADMIN_ACCESS_TOKEN_FIELD, "seed")])],
            vec![api_manager(Some("acme"))],
        ));
        let account = resolver.resolve("ns", None).await.unwrap();
        assert_eq!(account.admin_url, "https://acme-admin.apps.example.com");
        assert_eq!(account.token, "seed");
    }

    #[tokio::test]
    async fn api_manager_without_tenant_is_an_error() {
        let resolver = ProviderAccountResolver::new(source(vec![], vec![api_manager(None)]));
        let err = resolver.resolve("ns", None).await.unwrap_err();
        assert!(err.to_string().contains("tenantName is empty"));
    }

    #[tokio::test]
    async fn nothing_found_is_no_provider_account() {
        let resolver = ProviderAccountResolver::new(source(vec![], vec![api_manager(Some("acme"))]));
        let err = resolver.resolve("ns", None).await.unwrap_err();
        assert!(matches!(err, Error::NoProviderAccount { ref namespace } if namespace == "ns"));
    }

    #[tokio::test]
    async fn store_errors_stop_the_chain() {
        let mut mock = MockSecretSource::new();
        mock.expect_secret()
            .times(1)
            .returning(|_, _| Err(Error::internal("apiserver down")));
        mock.expect_api_managers().never();

        let resolver = ProviderAccountResolver::new(Arc::new(mock));
        let err = resolver.resolve("ns", None).await.unwrap_err();
        assert!(err.to_string().contains("apiserver down"));
    }

    #[test]
    fn standard_chain_order() {
        let resolver = ProviderAccountResolver::new(source(vec![], vec![]));
        assert_eq!(
            resolver.strategy_names(),
            vec!["explicit-secret", "default-secret", "apimanager"]
        );
    }

    #[test]
    fn debug_redacts_token() {
        let account = ProviderAccount {
            admin_url: "https://a".to_string(),
            token: "secret-token".to_string(),
        };
        assert!(!format!("{account:?}").contains("secret-token"));
    }

    #[test]
    fn tenant_match_is_exact() {
        let account = ProviderAccount {
            admin_url: "https://a-admin.example.com".to_string(),
            token: "tok".to_string(),
        };
        assert!(account.same_tenant("https://a-admin.example.com"));
        assert!(!account.same_tenant("https://a-admin.example.com/"));
        assert!(!account.same_tenant("https://b-admin.example.com"));
    }
}
