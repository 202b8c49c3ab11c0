//! Classification orchestrator: cache, prompt, client, validation.

use async_trait::async_trait;
use completion_client::CompletionClient;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::client::ClassificationClient;
use crate::document::DrugDocument;
use crate::error::{ClassificationError, Result};
use crate::prompts::PromptManager;
use crate::traits::cache_store::CacheStore;
use crate::traits::classifier::Classifier;
use crate::traits::completion::CompletionApi;
use crate::types::cache::WarmReport;
use crate::types::classification::{
    ClassificationMetadata, ClassificationOutcome, ClassificationResult,
};
use crate::types::config::ClassificationConfig;
use crate::validator::validate_classification;

/// Classifies drug documents, consulting the cache before the model.
///
/// Disabled classifiers (no client) return the unclassified outcome without
/// touching the cache.
pub struct DrugClassifier<A: CompletionApi, S: CacheStore> {
    client: Option<ClassificationClient<A>>,
    cache: CacheManager<S>,
    prompts: PromptManager,
}

impl<S: CacheStore> DrugClassifier<CompletionClient, S> {
    /// Build from configuration over the given cache store.
    ///
    /// A disabled config yields a disabled classifier. Fails if an enabled
    /// config has no usable client or the prompt file cannot be read.
    pub fn from_config(config: &ClassificationConfig, store: S) -> Result<Self> {
        let cache = CacheManager::new(store, config.cache_ttl);
        if !config.enabled {
            info!("AI classification is disabled");
            return Ok(Self::disabled(cache));
        }

        let prompts = PromptManager::from_optional_file(config.system_prompt_path.as_deref())?;
        let client = ClassificationClient::from_config(config)?;
        info!(model = %client.model(), "Initialized drug classifier");
        Ok(Self::new(client, cache).with_prompts(prompts))
    }
}

impl<A: CompletionApi, S: CacheStore> DrugClassifier<A, S> {
    /// Enabled classifier with the built-in system prompt.
    pub fn new(client: ClassificationClient<A>, cache: CacheManager<S>) -> Self {
        Self {
            client: Some(client),
            cache,
            prompts: PromptManager::default(),
        }
    }

    pub fn disabled(cache: CacheManager<S>) -> Self {
        Self {
            client: None,
            cache,
            prompts: PromptManager::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptManager) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn cache(&self) -> &CacheManager<S> {
        &self.cache
    }

    pub fn client(&self) -> Option<&ClassificationClient<A>> {
        self.client.as_ref()
    }

    /// Classify one document. Never fails; errors degrade to unclassified.
    pub async fn classify_document(&self, document: &DrugDocument) -> ClassificationOutcome {
        let Some(client) = &self.client else {
            debug!("AI classification is disabled");
            return ClassificationOutcome::unclassified();
        };
        let drug = document.drug_name().unwrap_or("Unknown");

        let key = self.cache.key_for(document);
        if let Some(hit) = self.cache.get(&key).await {
            info!(drug, "Using cached classification");
            return hit.into();
        }

        let started = Instant::now();
        match self.compute(client, document).await {
            Ok((classification, metadata)) => {
                if !self.cache.put(&key, &classification, &metadata).await {
                    warn!(drug, "Classification not cached");
                }
                info!(
                    drug,
                    class = %classification.primary_therapeutic_class,
                    "Classified drug"
                );
                ClassificationOutcome::computed(classification, metadata)
            }
            Err(err) => {
                let (attempts, processing_time) = match &err {
                    ClassificationError::RetriesExhausted {
                        attempts,
                        processing_time,
                        ..
                    } => (*attempts, *processing_time),
                    _ => (0, started.elapsed().as_secs_f64()),
                };
                error!(drug, error = %err, "Classification failed");
                ClassificationOutcome::failed(err.to_string(), attempts, processing_time)
            }
        }
    }

    async fn compute(
        &self,
        client: &ClassificationClient<A>,
        document: &DrugDocument,
    ) -> Result<(ClassificationResult, ClassificationMetadata)> {
        let user_prompt = self.prompts.build_user_prompt(document);
        let (raw, metadata) = client
            .classify(self.prompts.system_prompt(), &user_prompt)
            .await?;
        Ok((validate_classification(&raw), metadata))
    }

    /// Pre-populate the cache for `documents`.
    ///
    /// Documents with a live entry are counted as already cached. The rest
    /// are classified and stored. Classification or store failures count
    /// as failed; degraded results are never cached.
    pub async fn warm(&self, documents: &[DrugDocument]) -> WarmReport {
        let started = Instant::now();
        let mut report = WarmReport {
            total: documents.len(),
            ..Default::default()
        };

        for document in documents {
            let Some(client) = &self.client else {
                report.failed += 1;
                continue;
            };

            let key = self.cache.key_for(document);
            if self.cache.get(&key).await.is_some() {
                report.already_cached += 1;
                continue;
            }

            match self.compute(client, document).await {
                Ok((classification, metadata)) => {
                    if self.cache.put(&key, &classification, &metadata).await {
                        report.newly_cached += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Err(err) => {
                    error!(
                        drug = document.drug_name().unwrap_or("Unknown"),
                        error = %err,
                        "Cache warming failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report.processing_time = started.elapsed().as_secs_f64();
        info!(
            total = report.total,
            already_cached = report.already_cached,
            newly_cached = report.newly_cached,
            failed = report.failed,
            "Cache warming completed"
        );
        report
    }
}

#[async_trait]
impl<A: CompletionApi, S: CacheStore> Classifier for DrugClassifier<A, S> {
    async fn classify(&self, document: &DrugDocument) -> ClassificationOutcome {
        self.classify_document(document).await
    }

    fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}
