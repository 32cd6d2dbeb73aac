//! Music recommendations for a detected emotion.
//!
//! Live results come from a [`VideoSearch`] backend; any failure, an empty
//! result or a missing API key falls back to the offline [`FallbackTable`].

pub mod fallback;
pub mod youtube;

pub use fallback::{FallbackTable, Recommendation, TableError};
pub use youtube::{
    emotion_to_query, parse_search_response, SearchError, VideoSearch, YouTubeSearch,
};

/// Default number of live results requested per lookup.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Resolves an emotion label to recommendations.
pub struct Resolver<S = YouTubeSearch> {
    search: Option<S>,
    table: FallbackTable,
    max_results: usize,
}

impl Resolver<YouTubeSearch> {
    /// Live search when `api_key` is present and non-blank, table only otherwise.
    pub fn new(api_key: Option<&str>, max_results: usize) -> Self {
        Self::with_backend(api_key, |key| YouTubeSearch::new(key), max_results)
    }
}

impl<S: VideoSearch> Resolver<S> {
    /// Build the backend from `api_key` with `make`, unless the key is missing or blank.
    pub fn with_backend(
        api_key: Option<&str>,
        make: impl FnOnce(&str) -> S,
        max_results: usize,
    ) -> Self {
        let search = api_key.map(str::trim).filter(|key| !key.is_empty()).map(make);
        if search.is_none() {
            tracing::info!("no YouTube API key, using fallback recommendations");
        }
        Self {
            search,
            table: FallbackTable::builtin().clone(),
            max_results,
        }
    }

    pub fn with_search(search: S, max_results: usize) -> Self {
        Self {
            search: Some(search),
            table: FallbackTable::builtin().clone(),
            max_results,
        }
    }

    pub fn with_table(mut self, table: FallbackTable) -> Self {
        self.table = table;
        self
    }

    pub fn is_live(&self) -> bool {
        self.search.is_some()
    }

    pub fn fallback(&self, label: &str) -> Vec<Recommendation> {
        self.table.lookup(label).to_vec()
    }

    /// Recommendations for `label`. Never fails.
    pub async fn resolve(&self, label: &str) -> Vec<Recommendation> {
        let Some(search) = &self.search else {
            return self.fallback(label);
        };

        let query = emotion_to_query(label);
        match search.search(&query, self.max_results).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                tracing::debug!(label, query = %query, "search returned nothing, using fallback");
                self.fallback(label)
            }
            Err(e) => {
                tracing::warn!(label, error = %e, "video search failed, using fallback");
                self.fallback(label)
            }
        }
    }
}

/// One-shot lookup with the built-in table.
pub async fn resolve(
    label: &str,
    api_key: Option<&str>,
    max_results: usize,
) -> Vec<Recommendation> {
    Resolver::new(api_key, max_results).resolve(label).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Fail,
        Empty,
        Results(Vec<Recommendation>),
    }

    struct FakeSearch {
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
        queries: std::sync::Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: Arc::new(AtomicUsize::new(0)),
                queries: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl VideoSearch for FakeSearch {
        async fn search(
            &self,
            query: &str,
            _max_results: usize,
        ) -> Result<Vec<Recommendation>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            match &self.behaviour {
                Behaviour::Fail => Err(SearchError::Status {
                    status: 403,
                    body: "quotaExceeded".into(),
                }),
                Behaviour::Empty => Ok(Vec::new()),
                Behaviour::Results(recs) => Ok(recs.clone()),
            }
        }
    }

    fn song(title: &str) -> Recommendation {
        Recommendation {
            title: title.into(),
            link: format!("https://www.youtube.com/watch?v={title}"),
        }
    }

    #[tokio::test]
    async fn test_failing_backend_uses_fallback() {
        let resolver = Resolver::with_search(FakeSearch::new(Behaviour::Fail), 5);
        assert_eq!(resolver.resolve("sad").await, FallbackTable::builtin().lookup("sad"));
    }

    #[tokio::test]
    async fn test_empty_backend_uses_fallback() {
        let resolver = Resolver::with_search(FakeSearch::new(Behaviour::Empty), 5);
        assert_eq!(resolver.resolve("happy").await, FallbackTable::builtin().lookup("happy"));
    }

    #[tokio::test]
    async fn test_live_results_and_query() {
        let search = FakeSearch::new(Behaviour::Results(vec![song("a"), song("b")]));
        let resolver = Resolver::with_search(search, 2);

        let recs = resolver.resolve("angry").await;
        assert_eq!(recs, vec![song("a"), song("b")]);
        let queries = resolver.search.as_ref().unwrap().queries.lock().unwrap().clone();
        assert_eq!(queries, ["calming music for anger playlist"]);
    }

    #[tokio::test]
    async fn test_no_key_skips_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        for key in [None, Some(""), Some("  ")] {
            let resolver = Resolver::with_backend(
                key,
                |_| {
                    let mut search = FakeSearch::new(Behaviour::Results(vec![song("never")]));
                    search.calls = Arc::clone(&calls);
                    search
                },
                5,
            );
            assert_eq!(
                resolver.resolve("surprise").await,
                FallbackTable::builtin().lookup("surprise")
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_key_is_offline() {
        assert!(!Resolver::new(None, 5).is_live());
        assert!(!Resolver::new(Some("   "), 5).is_live());
        assert!(Resolver::new(Some("AIza-test"), 5).is_live());

        let recs = resolve("confused", Some(""), 5).await;
        assert_eq!(recs, FallbackTable::builtin().lookup("neutral"));
    }

    #[tokio::test]
    async fn test_custom_table() {
        let table = FallbackTable::from_toml(
            r#"
            [[neutral]]
            title = "House Mix"
            link = "https://example.com/house"
            "#,
        )
        .unwrap();
        let resolver = Resolver::with_search(FakeSearch::new(Behaviour::Fail), 5).with_table(table);
        assert_eq!(resolver.resolve("happy").await[0].title, "House Mix");
    }
}
