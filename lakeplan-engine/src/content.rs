//! One-shot loading of static lake and route content.
//!
//! Each resource is loaded at most once per cache lifetime. Failures are
//! cached as well and only retried after [`ContentCache::reload`].
use std::rc::Rc;
use thiserror::Error;

use crate::catalog::LakeCatalog;
use crate::constants::{LOG_CONTENT_FAILED, LOG_CONTENT_LOAD};
use crate::route::RouteCatalog;

pub const LAKES_RESOURCE: &str = "lakes";
pub const ROUTES_RESOURCE: &str = "routes";

const BUNDLED_LAKES: &str = include_str!("../assets/lakes.json");
const BUNDLED_ROUTES: &str = include_str!("../assets/routes.json");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("could not fetch '{resource}': {reason}")]
    Transport { resource: String, reason: String },
    #[error("could not parse '{resource}': {reason}")]
    Parse { resource: String, reason: String },
    #[error("'{resource}' is invalid: {reason}")]
    Invalid { resource: String, reason: String },
}

/// Trait for abstracting where static content comes from.
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the raw text of `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be fetched.
    fn load_text(&self, resource: &str) -> Result<String, Self::Error>;
}

/// Content compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledContent;

impl ContentLoader for BundledContent {
    type Error = ContentError;

    fn load_text(&self, resource: &str) -> Result<String, Self::Error> {
        match resource {
            LAKES_RESOURCE => Ok(BUNDLED_LAKES.to_string()),
            ROUTES_RESOURCE => Ok(BUNDLED_ROUTES.to_string()),
            other => Err(ContentError::Transport {
                resource: other.to_string(),
                reason: "not bundled".into(),
            }),
        }
    }
}

pub(crate) fn parse_lakes(text: &str) -> Result<LakeCatalog, ContentError> {
    let catalog: LakeCatalog = serde_json::from_str(text).map_err(|err| ContentError::Parse {
        resource: LAKES_RESOURCE.into(),
        reason: err.to_string(),
    })?;
    catalog.validate().map_err(|err| ContentError::Invalid {
        resource: LAKES_RESOURCE.into(),
        reason: err.to_string(),
    })?;
    Ok(catalog)
}

pub(crate) fn parse_routes(text: &str, lakes: &LakeCatalog) -> Result<RouteCatalog, ContentError> {
    let catalog: RouteCatalog = serde_json::from_str(text).map_err(|err| ContentError::Parse {
        resource: ROUTES_RESOURCE.into(),
        reason: err.to_string(),
    })?;
    catalog.validate(lakes).map_err(|err| ContentError::Invalid {
        resource: ROUTES_RESOURCE.into(),
        reason: err.to_string(),
    })?;
    Ok(catalog)
}

fn logged<T>(resource: &str, result: Result<T, ContentError>) -> Result<T, ContentError> {
    match &result {
        Ok(_) => log::info!("{LOG_CONTENT_LOAD}: {resource}"),
        Err(err) => log::warn!("{LOG_CONTENT_FAILED}: {err}"),
    }
    result
}

/// Cached, parsed content for one loader.
#[derive(Debug)]
pub struct ContentCache<L: ContentLoader> {
    loader: L,
    lakes: Option<Result<Rc<LakeCatalog>, ContentError>>,
    routes: Option<Result<Rc<RouteCatalog>, ContentError>>,
}

impl<L: ContentLoader> ContentCache<L> {
    pub const fn new(loader: L) -> Self {
        Self {
            loader,
            lakes: None,
            routes: None,
        }
    }

    pub const fn loader(&self) -> &L {
        &self.loader
    }

    fn fetch(&self, resource: &str) -> Result<String, ContentError> {
        self.loader
            .load_text(resource)
            .map_err(|err| ContentError::Transport {
                resource: resource.to_string(),
                reason: err.to_string(),
            })
    }

    /// # Errors
    ///
    /// Returns the (possibly cached) load failure.
    pub fn lakes(&mut self) -> Result<Rc<LakeCatalog>, ContentError> {
        if let Some(cached) = &self.lakes {
            return cached.clone();
        }
        let loaded = self
            .fetch(LAKES_RESOURCE)
            .and_then(|text| parse_lakes(&text))
            .map(Rc::new);
        let loaded = logged(LAKES_RESOURCE, loaded);
        self.lakes = Some(loaded.clone());
        loaded
    }

    /// Routes are validated against the lakes, so a lake failure is
    /// reported here too.
    ///
    /// # Errors
    ///
    /// Returns the (possibly cached) load failure.
    pub fn routes(&mut self) -> Result<Rc<RouteCatalog>, ContentError> {
        if let Some(cached) = &self.routes {
            return cached.clone();
        }
        let lakes = self.lakes()?;
        let loaded = self
            .fetch(ROUTES_RESOURCE)
            .and_then(|text| parse_routes(&text, &lakes))
            .map(Rc::new);
        let loaded = logged(ROUTES_RESOURCE, loaded);
        self.routes = Some(loaded.clone());
        loaded
    }

    /// Forget everything; the next access loads again.
    pub fn reload(&mut self) {
        self.lakes = None;
        self.routes = None;
    }
}

#[cfg(feature = "async")]
pub use self::nonblocking::{AsyncContentCache, AsyncContentLoader};

#[cfg(feature = "async")]
mod nonblocking {
    use std::future::Future;
    use std::sync::Arc;
    use tokio::sync::OnceCell;

    use super::{
        ContentError, LAKES_RESOURCE, ROUTES_RESOURCE, logged, parse_lakes, parse_routes,
    };
    use crate::catalog::LakeCatalog;
    use crate::route::RouteCatalog;

    pub trait AsyncContentLoader {
        type Error: std::error::Error + Send + Sync + 'static;

        /// # Errors
        ///
        /// Returns an error if the resource cannot be fetched.
        fn load_text(&self, resource: &str) -> impl Future<Output = Result<String, Self::Error>>;
    }

    /// Concurrent callers share one in-flight load per resource.
    #[derive(Debug)]
    pub struct AsyncContentCache<L: AsyncContentLoader> {
        loader: L,
        lakes: OnceCell<Result<Arc<LakeCatalog>, ContentError>>,
        routes: OnceCell<Result<Arc<RouteCatalog>, ContentError>>,
    }

    impl<L: AsyncContentLoader> AsyncContentCache<L> {
        pub fn new(loader: L) -> Self {
            Self {
                loader,
                lakes: OnceCell::new(),
                routes: OnceCell::new(),
            }
        }

        pub const fn loader(&self) -> &L {
            &self.loader
        }

        async fn fetch(&self, resource: &str) -> Result<String, ContentError> {
            self.loader
                .load_text(resource)
                .await
                .map_err(|err| ContentError::Transport {
                    resource: resource.to_string(),
                    reason: err.to_string(),
                })
        }

        /// # Errors
        ///
        /// Returns the (possibly cached) load failure.
        pub async fn lakes(&self) -> Result<Arc<LakeCatalog>, ContentError> {
            self.lakes
                .get_or_init(|| async {
                    let loaded = self
                        .fetch(LAKES_RESOURCE)
                        .await
                        .and_then(|text| parse_lakes(&text))
                        .map(Arc::new);
                    logged(LAKES_RESOURCE, loaded)
                })
                .await
                .clone()
        }

        /// # Errors
        ///
        /// Returns the (possibly cached) load failure.
        pub async fn routes(&self) -> Result<Arc<RouteCatalog>, ContentError> {
            self.routes
                .get_or_init(|| async {
                    let lakes = self.lakes().await?;
                    let loaded = self
                        .fetch(ROUTES_RESOURCE)
                        .await
                        .and_then(|text| parse_routes(&text, &lakes))
                        .map(Arc::new);
                    logged(ROUTES_RESOURCE, loaded)
                })
                .await
                .clone()
        }

        pub fn reload(&mut self) {
            self.lakes = OnceCell::new();
            self.routes = OnceCell::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Error)]
    #[error("offline")]
    struct Offline;

    /// Serves bundled content once `online`, counting every fetch.
    #[derive(Debug, Default)]
    struct FlakyLoader {
        online: Cell<bool>,
        fetches: Cell<u32>,
    }

    impl ContentLoader for FlakyLoader {
        type Error = Offline;

        fn load_text(&self, resource: &str) -> Result<String, Self::Error> {
            self.fetches.set(self.fetches.get() + 1);
            if self.online.get() {
                BundledContent.load_text(resource).map_err(|_| Offline)
            } else {
                Err(Offline)
            }
        }
    }

    #[test]
    fn bundled_content_loads_once() {
        let mut cache = ContentCache::new(FlakyLoader::default());
        cache.loader().online.set(true);
        let lakes = cache.lakes().unwrap();
        let again = cache.lakes().unwrap();
        assert!(Rc::ptr_eq(&lakes, &again));
        let routes = cache.routes().unwrap();
        assert!(!routes.options.is_empty());
        assert_eq!(cache.loader().fetches.get(), 2);
    }

    #[test]
    fn failures_are_cached_until_reload() {
        let mut cache = ContentCache::new(FlakyLoader::default());
        let err = cache.lakes().unwrap_err();
        assert!(matches!(err, ContentError::Transport { .. }));
        cache.loader().online.set(true);
        assert_eq!(cache.lakes().unwrap_err(), err);
        assert_eq!(cache.loader().fetches.get(), 1);

        cache.reload();
        assert!(cache.lakes().is_ok());
        assert_eq!(cache.loader().fetches.get(), 2);
    }

    #[test]
    fn parse_and_validation_errors_are_distinct() {
        assert!(matches!(
            parse_lakes("{"),
            Err(ContentError::Parse { .. })
        ));
        assert!(matches!(
            parse_lakes(r#"{"pools": []}"#),
            Err(ContentError::Invalid { .. })
        ));
        let lakes = parse_lakes(BUNDLED_LAKES).unwrap();
        let bad_route = r#"{"options":[{"id":"x","name":"X","steps":[{"pool":"nowhere","action":"go","goal":{"type":"manual_confirm","target":1}}]}]}"#;
        assert!(matches!(
            parse_routes(bad_route, &lakes),
            Err(ContentError::Invalid { .. })
        ));
    }

    #[cfg(feature = "async")]
    mod nonblocking_cache {
        use super::super::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        #[derive(Debug, Default)]
        struct CountingLoader {
            fetches: AtomicU32,
        }

        impl AsyncContentLoader for CountingLoader {
            type Error = ContentError;

            async fn load_text(&self, resource: &str) -> Result<String, Self::Error> {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                BundledContent.load_text(resource)
            }
        }

        #[tokio::test]
        async fn concurrent_callers_share_one_load() {
            let cache = AsyncContentCache::new(CountingLoader::default());
            let (a, b) = tokio::join!(cache.lakes(), cache.lakes());
            assert!(std::sync::Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
            assert!(cache.routes().await.is_ok());
            assert_eq!(cache_fetches(&cache), 2);
        }

        fn cache_fetches(cache: &AsyncContentCache<CountingLoader>) -> u32 {
            cache.loader().fetches.load(Ordering::SeqCst)
        }
    }
}
