use crate::models::{IngredientSection, ParsedIngredient, Recipe};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

// "Serves 4", "Servings: 4"
static SERVES_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:serves?|servings?:?)\s*(\d+)").ok());

// "4 to 6", "4-6"
static RANGE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:to|-)\s*(\d+)").ok());

static LEADING_NUMBER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)").ok());

static HOURS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:hours?|hrs?|h)\b").ok());

static MINUTES_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:minutes?|mins?|m)\b").ok());

static INGREDIENTS_HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(#{2,3})\s+Ingredients").ok());

static DIRECTIONS_HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^#{2,3}\s+Directions\s*$").ok());

static SECTION_HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^#{2,3}\s+").ok());

fn capture_u32(pattern: &LazyLock<Option<Regex>>, text: &str, group: usize) -> Option<u32> {
    pattern
        .as_ref()?
        .captures(text)?
        .get(group)?
        .as_str()
        .parse()
        .ok()
}

/// Parses servings given as a number or free text ("Serves 4", "4 to 6 servings", "1 Bowl").
pub fn normalize_servings(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| *v > 0.0).map(|v| v as u32),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Some(v) = capture_u32(&SERVES_PATTERN, s, 1) {
                return Some(v);
            }
            if let (Some(lo), Some(hi)) = (
                capture_u32(&RANGE_PATTERN, s, 1),
                capture_u32(&RANGE_PATTERN, s, 2),
            ) {
                return Some(((lo as u64 + hi as u64) / 2) as u32);
            }
            capture_u32(&LEADING_NUMBER_PATTERN, s, 1).filter(|v| *v > 0)
        }
        _ => None,
    }
}

/// Parses a duration into minutes ("1 hour 30 minutes", "5 mins", 15).
pub fn normalize_time(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| *v > 0.0).map(|v| v as u32),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let hours = capture_u32(&HOURS_PATTERN, s, 1).unwrap_or(0);
            let minutes = capture_u32(&MINUTES_PATTERN, s, 1).unwrap_or(0);
            // out-of-range durations are unparseable, not clamped
            let total = hours.checked_mul(60)?.checked_add(minutes)?;
            if total > 0 {
                return Some(total);
            }
            if s.chars().all(|c| c.is_ascii_digit()) {
                return s.parse().ok();
            }
            None
        }
        _ => None,
    }
}

/// Text under `## Ingredients` (or `###`) up to the next heading of equal or higher level.
pub fn extract_ingredients_section(body: &str) -> Option<String> {
    let heading = INGREDIENTS_HEADING.as_ref()?;
    let mut section_level: Option<usize> = None;
    let mut lines = Vec::new();

    for line in body.lines() {
        match section_level {
            None => {
                if let Some(caps) = heading.captures(line) {
                    section_level = caps.get(1).map(|m| m.as_str().len());
                }
            }
            Some(level) => {
                let hashes = line.chars().take_while(|c| *c == '#').count();
                let rest = &line[hashes..];
                if hashes >= 1 && hashes <= level && rest.starts_with(char::is_whitespace) {
                    break;
                }
                lines.push(line);
            }
        }
    }

    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Text under `## Directions` (or `###`) up to the next `##`/`###` heading.
pub fn extract_directions_section(body: &str) -> Option<String> {
    let heading = DIRECTIONS_HEADING.as_ref()?;
    let next_heading = SECTION_HEADING.as_ref()?;
    let mut lines = body.lines().skip_while(|line| !heading.is_match(line));
    lines.next()?;
    let text = lines
        .take_while(|line| !next_heading.is_match(line))
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// First 16 hex chars of SHA-256 over the trimmed, lower-cased ingredient text.
pub fn compute_ingredients_hash(raw_ingredients: &str) -> String {
    let normalized = raw_ingredients.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Splits `---` delimited YAML front matter from the markdown body.
pub fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let after_first = content.trim_start().strip_prefix("---")?;
    let end_pos = after_first.find("\n---")?;
    let yaml = after_first[..end_pos].trim();
    let body = after_first[end_pos + 4..].trim_start_matches('-');
    Some((yaml, body))
}

fn to_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_string(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn to_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

/// Accepts a YAML list or a comma-separated string.
fn to_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| to_string(Some(v)))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_ingredient_sections(value: Option<&Value>) -> Vec<IngredientSection> {
    let Some(Value::Sequence(sections)) = value else {
        return Vec::new();
    };
    sections
        .iter()
        .filter_map(|section| {
            let Value::Mapping(map) = section else {
                return None;
            };
            let items = match map.get("items") {
                Some(Value::Sequence(items)) => items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Mapping(m) => Some(ParsedIngredient {
                            qty: to_f64(m.get("qty")),
                            unit: to_string(m.get("unit")),
                            item: to_string(m.get("item")).unwrap_or_default(),
                            notes: to_string(m.get("notes")),
                        }),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Some(IngredientSection {
                section: to_string(map.get("section")),
                items,
            })
        })
        .collect()
}

/// Builds a recipe from a markdown note. Returns `None` for notes that are
/// not recipes or whose front matter does not parse.
pub fn parse_recipe_content(file_path: &Path, content: &str) -> Option<Recipe> {
    let (yaml, body) = split_front_matter(content)?;
    let meta: Mapping = match serde_yaml::from_str(yaml) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %file_path.display(), error = %e, "Invalid front matter");
            return None;
        }
    };
    if to_string(meta.get("type")).as_deref() != Some("recipe") {
        return None;
    }

    let name = file_path.file_stem()?.to_string_lossy().to_string();
    let rating = to_f64(meta.get("rating")).filter(|r| *r != 0.0);
    let none = Value::Null;

    Some(Recipe {
        name,
        file_path: file_path.to_path_buf(),
        calories: to_f64(meta.get("calories")),
        protein_g: to_f64(meta.get("protein_g")),
        fat_g: to_f64(meta.get("fat_g")),
        carbs_g: to_f64(meta.get("carbs_g")),
        fiber_g: to_f64(meta.get("fiber_g")),
        servings: normalize_servings(meta.get("servings").unwrap_or(&none)),
        prep_time_min: normalize_time(meta.get("prep_time").unwrap_or(&none)),
        cook_time_min: normalize_time(meta.get("cook_time").unwrap_or(&none)),
        total_time_min: normalize_time(meta.get("total_time").unwrap_or(&none)),
        meal_type: to_string(meta.get("meal_type")),
        cuisine: to_string(meta.get("cuisine")),
        main_ingredient: to_string(meta.get("main_ingredient")),
        cooking_method: to_string(meta.get("cooking_method")),
        dietary_tags: to_string_list(meta.get("dietary_tags")),
        categories: to_string_list(meta.get("categories")),
        rating,
        quick_recipe: to_bool(meta.get("quick_recipe")),
        tried: to_bool(meta.get("tried")),
        favorite: to_bool(meta.get("favorite")),
        last_made: to_string(meta.get("last_made")),
        parsed_ingredients: parse_ingredient_sections(meta.get("parsed_ingredients")),
        ingredients_hash: to_string(meta.get("ingredients_hash")),
        raw_ingredients: extract_ingredients_section(body),
        directions: extract_directions_section(body),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub parsed_ok: usize,
    pub parse_errors: usize,
    pub with_ingredients: usize,
    pub with_nutrition: usize,
    pub with_parsed_ingredients: usize,
    pub servings_parsed: usize,
    pub servings_unparseable: usize,
}

impl IndexStats {
    fn record(&mut self, recipe: &Recipe) {
        self.parsed_ok += 1;
        if recipe.raw_ingredients.is_some() {
            self.with_ingredients += 1;
        }
        if recipe.calories.is_some() && recipe.protein_g.is_some() {
            self.with_nutrition += 1;
        }
        if !recipe.parsed_ingredients.is_empty() {
            self.with_parsed_ingredients += 1;
        }
        if recipe.servings.is_some() {
            self.servings_parsed += 1;
        } else {
            self.servings_unparseable += 1;
        }
    }
}

/// All `*.md` files in the directory, sorted by path.
pub async fn discover_recipe_files(cooking_path: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(cooking_path)
        .await
        .with_context(|| format!("Failed to read recipe directory {:?}", cooking_path))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    Ok(files)
}

/// Loads every recipe note under `cooking_path` and reports index statistics.
pub async fn load_recipes_with_stats(
    cooking_path: &Path,
    limit: Option<usize>,
) -> Result<(Vec<Recipe>, IndexStats)> {
    let files = discover_recipe_files(cooking_path, limit).await?;
    let mut stats = IndexStats {
        total_files: files.len(),
        ..Default::default()
    };
    let mut recipes = Vec::with_capacity(files.len());

    for path in files {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read recipe file {:?}", path))?;
        match parse_recipe_content(&path, &content) {
            Some(recipe) => {
                debug!(
                    recipe = %recipe.name,
                    servings = ?recipe.servings,
                    calories = ?recipe.calories,
                    protein = ?recipe.protein_g,
                    time = ?recipe.total_time_min,
                    "Parsed recipe"
                );
                stats.record(&recipe);
                recipes.push(recipe);
            }
            None => {
                stats.parse_errors += 1;
                debug!(path = %path.display(), "Skipped: not a recipe or parse error");
            }
        }
    }
    Ok((recipes, stats))
}

pub async fn load_all_recipes(cooking_path: &Path) -> Result<Vec<Recipe>> {
    let (recipes, _) = load_recipes_with_stats(cooking_path, None).await?;
    Ok(recipes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TIKKA: &str = "---
type: recipe
calories: 550
protein_g: \"40\"
servings: Serves 4
prep_time: 15 mins
cook_time: 1 hour 5 minutes
meal_type: Dinner
cuisine: Indian
dietary_tags: gluten-free, high-protein
categories: [Main Course, Curry]
rating: 4.5
favorite: true
parsed_ingredients:
  - section: Sauce
    items:
      - qty: 2
        unit: cups
        item: tomato puree
---
# Chicken Tikka Masala

## Ingredients

- 1 lb chicken thighs
- 2 cups tomato puree

### Notes on spice
- garam masala

## Directions

Cook it.
";

    #[test]
    fn test_normalize_servings_formats() {
        let s = |v: &str| normalize_servings(&Value::String(v.to_string()));
        assert_eq!(s("Serves 4"), Some(4));
        assert_eq!(s("Servings: 6"), Some(6));
        assert_eq!(s("4 to 6 servings"), Some(5));
        assert_eq!(s("4-6"), Some(5));
        assert_eq!(s("1 Bowl"), Some(1));
        assert_eq!(s(""), None);
        assert_eq!(s("a few"), None);
        assert_eq!(s("4000000000 to 4000000000"), Some(4_000_000_000));
        assert_eq!(normalize_servings(&Value::from(3)), Some(3));
        assert_eq!(normalize_servings(&Value::from(0)), None);
    }

    #[test]
    fn test_normalize_time_formats() {
        let t = |v: &str| normalize_time(&Value::String(v.to_string()));
        assert_eq!(t("10 minutes"), Some(10));
        assert_eq!(t("5 mins"), Some(5));
        assert_eq!(t("3 hours"), Some(180));
        assert_eq!(t("1 hour 30 minutes"), Some(90));
        assert_eq!(t("45"), Some(45));
        assert_eq!(t("overnight"), None);
        assert_eq!(t("99999999 hours"), None);
        assert_eq!(t("71582788 hours 20 minutes"), None);
        assert_eq!(normalize_time(&Value::from(15)), Some(15));
    }

    #[test]
    fn test_extract_ingredients_section_stops_at_same_level() {
        let (_, body) = split_front_matter(TIKKA).unwrap();
        let section = extract_ingredients_section(body).unwrap();
        assert!(section.contains("chicken thighs"));
        assert!(section.contains("garam masala"));
        assert!(!section.contains("Cook it"));
    }

    #[test]
    fn test_extract_directions_section() {
        let (_, body) = split_front_matter(TIKKA).unwrap();
        assert_eq!(extract_directions_section(body).as_deref(), Some("Cook it."));

        let body = "### Directions\n\n1. Boil.\n2. Serve.\n\n## Notes\nkeeps 3 days\n";
        assert_eq!(extract_directions_section(body).as_deref(), Some("1. Boil.\n2. Serve."));
        assert_eq!(extract_directions_section("## Method\nstir"), None);
    }

    #[test]
    fn test_compute_ingredients_hash_is_normalized() {
        let a = compute_ingredients_hash("  2 Cups Rice\n");
        let b = compute_ingredients_hash("2 cups rice");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_parse_recipe_content_fields() {
        let recipe = parse_recipe_content(Path::new("/vault/Chicken Tikka Masala.md"), TIKKA).unwrap();
        assert_eq!(recipe.name, "Chicken Tikka Masala");
        assert_eq!(recipe.calories, Some(550.0));
        assert_eq!(recipe.protein_g, Some(40.0));
        assert_eq!(recipe.servings, Some(4));
        assert_eq!(recipe.prep_time_min, Some(15));
        assert_eq!(recipe.cook_time_min, Some(65));
        assert_eq!(recipe.total_time_min, None);
        assert_eq!(recipe.dietary_tags, vec!["gluten-free", "high-protein"]);
        assert_eq!(recipe.categories, vec!["Main Course", "Curry"]);
        assert_eq!(recipe.rating, Some(4.5));
        assert!(recipe.favorite);
        assert!(!recipe.tried);
        assert_eq!(recipe.parsed_ingredients.len(), 1);
        assert_eq!(recipe.parsed_ingredients[0].items[0].item, "tomato puree");
        assert_eq!(recipe.parsed_ingredients[0].items[0].qty, Some(2.0));
    }

    #[test]
    fn test_parse_recipe_content_rejects_non_recipes() {
        assert!(parse_recipe_content(Path::new("note.md"), "---\ntype: note\n---\nbody").is_none());
        assert!(parse_recipe_content(Path::new("plain.md"), "# Just markdown").is_none());
    }

    #[tokio::test]
    async fn test_load_recipes_with_stats() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("Chicken Tikka Masala.md"), TIKKA)?;
        std::fs::write(dir.path().join("Shopping.md"), "---\ntype: list\n---\n")?;
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2])?;

        let (recipes, stats) = load_recipes_with_stats(dir.path(), None).await?;
        assert_eq!(recipes.len(), 1);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.parsed_ok, 1);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.with_nutrition, 1);
        assert_eq!(stats.with_parsed_ingredients, 1);
        assert_eq!(stats.servings_parsed, 1);
        Ok(())
    }
}
