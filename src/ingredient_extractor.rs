use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{ChatCompletionRequest, ChatMessage, Provider, ResponseFormat};
use crate::corpus::{compute_ingredients_hash, load_recipes_with_stats, IndexStats};
use crate::models::{IngredientSection, Recipe};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const CACHE_FILE: &str = ".ingredient-cache.json";

const SYSTEM_PROMPT: &str = "You convert recipe ingredient lists into structured JSON.
Return only a JSON object, with no commentary and no markdown fences, of the form:
{\"sections\": [{\"section\": <heading or null>, \"items\": [{\"qty\": <number or null>, \"unit\": <string or null>, \"item\": <ingredient name>, \"notes\": <string or null>}]}]}
Use one section per sub-heading in the list, or a single section with a null heading when there are none.
Convert fractions to decimals (1/2 -> 0.5). Put preparation details (chopped, divided, to taste) in notes.";

/// Parsed ingredient sections keyed by the content hash of the raw text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientCache {
    entries: BTreeMap<String, Vec<IngredientSection>>,
}

impl IngredientCache {
    /// Reads the cache file. A missing or unreadable cache starts empty.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => {
                debug!(path = %path.display(), "No ingredient cache yet");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt ingredient cache");
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize ingredient cache")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write ingredient cache {:?}", path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hash: &str) -> Option<&Vec<IngredientSection>> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, sections: Vec<IngredientSection>) {
        self.entries.insert(hash, sections);
    }

    /// Fills `parsed_ingredients` on recipes that lack them and whose raw
    /// ingredient text is cached. Returns how many recipes were filled.
    pub fn apply(&self, recipes: &mut [Recipe]) -> usize {
        let mut filled = 0;
        for recipe in recipes.iter_mut() {
            if !recipe.parsed_ingredients.is_empty() {
                continue;
            }
            let Some(raw) = recipe.raw_ingredients.as_deref() else {
                continue;
            };
            let hash = compute_ingredients_hash(raw);
            if let Some(sections) = self.entries.get(&hash) {
                recipe.parsed_ingredients = sections.clone();
                recipe.ingredients_hash = Some(hash);
                filled += 1;
            }
        }
        filled
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    sections: Vec<IngredientSection>,
}

/// Removes a surrounding markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

pub fn parse_extraction(content: &str) -> Result<Vec<IngredientSection>, ApiConnectionError> {
    let json = strip_code_fences(content);
    if json.is_empty() {
        return Err(ApiConnectionError::EmptyCompletion);
    }
    let parsed: ExtractionResponse = serde_json::from_str(json)?;
    Ok(parsed.sections)
}

/// Sends one recipe's raw ingredient text to the model and parses the reply.
pub async fn extract_ingredients(
    provider: &Provider,
    model: &str,
    raw_ingredients: &str,
) -> Result<Vec<IngredientSection>, ApiConnectionError> {
    let request = ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(raw_ingredients),
        ],
        response_format: Some(ResponseFormat::json_object()),
        temperature: Some(0.0),
        max_tokens: Some(2048),
    };
    let response = provider.call_chat_completion(request).await?;
    let content = response.first_content().ok_or(ApiConnectionError::EmptyCompletion)?;
    parse_extraction(content)
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub model: String,
    /// Re-extract even when the cache holds the hash.
    pub force: bool,
    pub workers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub from_cache: usize,
    pub failed: usize,
}

/// Extracts structured ingredients for every recipe with raw ingredient text,
/// running at most `options.workers` requests at once. Successful results are
/// written to the recipes and the cache.
pub async fn extract_all(
    recipes: &mut [Recipe],
    cache: &mut IngredientCache,
    provider: Provider,
    options: &ExtractionOptions,
    progress_updater: impl Fn(String),
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    let mut jobs = Vec::new();

    for (index, recipe) in recipes.iter_mut().enumerate() {
        let Some(raw) = recipe.raw_ingredients.clone() else {
            continue;
        };
        let hash = compute_ingredients_hash(&raw);
        if !options.force {
            if let Some(sections) = cache.get(&hash) {
                recipe.parsed_ingredients = sections.clone();
                recipe.ingredients_hash = Some(hash);
                report.from_cache += 1;
                continue;
            }
        }
        jobs.push((index, hash, raw));
    }

    let total = jobs.len();
    progress_updater(format!(
        "{} recipes to extract, {} served from cache",
        total, report.from_cache
    ));

    let provider = Arc::new(provider);
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut set = JoinSet::new();
    for (index, hash, raw) in jobs {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let model = options.model.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = extract_ingredients(&provider, &model, &raw).await;
            (index, hash, result)
        });
    }

    let mut done = 0;
    while let Some(joined) = set.join_next().await {
        done += 1;
        match joined {
            Ok((index, hash, Ok(sections))) => {
                let recipe = &mut recipes[index];
                progress_updater(format!("[{}/{}] Extracted {}", done, total, recipe.name));
                cache.insert(hash.clone(), sections.clone());
                recipe.parsed_ingredients = sections;
                recipe.ingredients_hash = Some(hash);
                report.extracted += 1;
            }
            Ok((index, _, Err(e))) => {
                let name = &recipes[index].name;
                warn!(recipe = %name, error = %e, "Ingredient extraction failed");
                progress_updater(format!("[{}/{}] Failed {}: {}", done, total, name, e));
                report.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Extraction task panicked or was cancelled");
                report.failed += 1;
            }
        }
    }
    report
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub dry_run: bool,
    pub skip_api: bool,
    pub limit: Option<usize>,
    pub extraction: ExtractionOptions,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    pub stats: IndexStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionReport>,
    pub cached_entries: usize,
}

/// The `index` command: load the corpus, report statistics and, unless told
/// otherwise, extract missing ingredient structure into the cache.
pub async fn run_index(
    cooking_path: &Path,
    options: &IndexOptions,
    progress_updater: impl Fn(String),
) -> Result<IndexSummary> {
    let (mut recipes, stats) = load_recipes_with_stats(cooking_path, options.limit).await?;
    progress_updater(format!(
        "Parsed {}/{} recipe files",
        stats.parsed_ok, stats.total_files
    ));

    let cache_path = cooking_path.join(CACHE_FILE);
    let mut cache = IngredientCache::load(&cache_path).await;
    let mut summary = IndexSummary {
        stats,
        extraction: None,
        cached_entries: cache.len(),
    };
    if options.dry_run || options.skip_api {
        return Ok(summary);
    }

    let provider = Provider::openrouter(API_KEY_ENV_VAR);
    let report = extract_all(
        &mut recipes,
        &mut cache,
        provider,
        &options.extraction,
        &progress_updater,
    )
    .await;
    if report.extracted > 0 {
        cache.save(&cache_path).await?;
    }
    summary.cached_entries = cache.len();
    summary.extraction = Some(report);
    Ok(summary)
}
