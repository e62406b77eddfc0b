//! Shared services for bindings created from one configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::EvolveConfig;
use crate::errors::EvolveResult;
use crate::evolve::mode::ModeFlag;
use crate::evolve::wrapper::{EvolutionBuilder, EvolutionWrapper};
use crate::generation::gateway::{GenerationGateway, SuggestionEngine};
use crate::source::cache::SourceCache;

/// Engine, parse cache and mode flag handed to every binding it creates.
#[derive(Clone)]
pub struct EvolveContext {
    engine: Arc<dyn SuggestionEngine>,
    cache: Arc<SourceCache>,
    mode: ModeFlag,
}

impl EvolveContext {
    pub fn new(engine: Arc<dyn SuggestionEngine>, cache: Arc<SourceCache>, mode: ModeFlag) -> Self {
        Self { engine, cache, mode }
    }

    /// Gateway, cache size and initial mode all come from `config`.
    pub fn from_config(config: &EvolveConfig) -> EvolveResult<Self> {
        config.validate()?;
        let gateway = GenerationGateway::from_config(config)?;
        let cache = SourceCache::from_config(config);
        info!(
            mode = %config.mode,
            cache_entries = config.cache.max_entries,
            "initialized evolve context"
        );
        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(cache),
            ModeFlag::new(config.mode.clone()),
        ))
    }

    pub fn engine(&self) -> &Arc<dyn SuggestionEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    pub fn mode(&self) -> &ModeFlag {
        &self.mode
    }

    /// Start a binding that shares this context's engine, cache and mode.
    pub fn bind(&self, name: impl Into<String>, source: impl AsRef<str>) -> EvolutionBuilder {
        EvolutionWrapper::builder(name, source)
            .engine(Arc::clone(&self.engine))
            .cache(Arc::clone(&self.cache))
            .mode(self.mode.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolve::report::TracingReporter;

    fn offline_config() -> EvolveConfig {
        let mut config = EvolveConfig::default();
        config.mode = "development".to_string();
        config.cache.max_entries = 3;
        config.gateway.api_keys.clear();
        config.gateway.api_key_env.clear();
        config
    }

    #[test]
    fn test_cache_sized_from_config() {
        let context = EvolveContext::from_config(&offline_config()).unwrap();
        assert_eq!(context.cache().stats().max_entries, 3);
        assert_eq!(context.mode().setting(), "development");
    }

    #[test]
    fn test_bindings_share_cache_and_mode() {
        let context = EvolveContext::from_config(&offline_config()).unwrap();
        let source = "def add(a, b):\n    print(a)\n    return a + b\n";
        let first = context
            .bind("add", source)
            .reporter(Arc::new(TracingReporter))
            .wrap(|(a, b): (i32, i32)| a + b)
            .unwrap();
        let second = context
            .bind("add", source)
            .reporter(Arc::new(TracingReporter))
            .wrap(|(a, b): (i32, i32)| a + b)
            .unwrap();

        // No credentials, so both fall back to local analysis through the
        // shared cache.
        assert_eq!(first.call((5, 3)), 8);
        assert_eq!(second.call((1, 1)), 2);
        assert_eq!(first.last_suggestions().len(), 2);
        let stats = context.cache().stats();
        assert_eq!((stats.misses, stats.hits, stats.entries), (1, 1, 1));

        context.mode().set("production");
        first.call((0, 0));
        assert_eq!(context.cache().stats().hits, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = offline_config();
        config.max_suggestions = 0;
        assert!(EvolveContext::from_config(&config).is_err());
    }
}
