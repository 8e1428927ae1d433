use crate::models::Recipe;
use crate::optim::pools::{filter_recipes, RecipeFilter};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

const MACRO_SERVINGS: [f64; 4] = [1.0, 1.5, 2.0, 3.0];

/// Per-dimension points that add up to a recipe's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub pantry: f64,
    pub rating: f64,
    pub recency: f64,
    pub macro_fit: f64,
    pub variety: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.pantry + self.rating + self.recency + self.macro_fit + self.variety
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecipe<'a> {
    pub recipe: &'a Recipe,
    pub score: f64,
    pub suggested_servings: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestRequest {
    pub filter: RecipeFilter,
    /// Ingredients on hand, matched against parsed ingredient names.
    pub available: Vec<String>,
    pub target_calories: Option<u32>,
    pub target_protein: Option<u32>,
    pub limit: usize,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share (0-1) of a recipe's parsed ingredients found in the pantry, matching
/// substrings either way.
pub fn pantry_overlap(recipe: &Recipe, pantry: &[String]) -> f64 {
    let names = recipe.ingredient_names();
    if pantry.is_empty() || names.is_empty() {
        return 0.0;
    }
    let pantry: Vec<String> = pantry.iter().map(|p| p.trim().to_lowercase()).collect();
    let matched = names
        .iter()
        .filter(|item| pantry.iter().any(|p| item.contains(p.as_str()) || p.contains(item.as_str())))
        .count();
    matched as f64 / names.len() as f64
}

/// Best fit (0-1) of a recipe to the targets over 1, 1.5, 2 and 3 servings,
/// with the serving count that achieved it.
pub fn macro_fit(recipe: &Recipe, target_calories: Option<u32>, target_protein: Option<u32>) -> (f64, f64) {
    if recipe.calories.is_none() && recipe.protein_g.is_none() {
        return (0.5, 1.0);
    }
    let closeness = |actual: Option<f64>, target: Option<u32>, servings: f64| match (actual, target) {
        (Some(value), Some(target)) if target > 0 && value != 0.0 => {
            let target = target as f64;
            (1.0 - (value * servings - target).abs() / target).max(0.0)
        }
        _ => 0.0,
    };
    let both = matches!((target_calories, target_protein), (Some(c), Some(p)) if c > 0 && p > 0);

    let mut best = (0.0, 1.0);
    for servings in MACRO_SERVINGS {
        let cal = closeness(recipe.calories, target_calories, servings);
        let pro = closeness(recipe.protein_g, target_protein, servings);
        let combined = if both { cal * 0.4 + pro * 0.6 } else { cal.max(pro) };
        if combined > best.0 {
            best = (combined, servings);
        }
    }
    best
}

/// Points for not having cooked the recipe recently.
pub fn recency_score(last_made: Option<&str>, today: NaiveDate) -> f64 {
    let Some(date) = last_made.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()) else {
        return 15.0;
    };
    match (today - date).num_days() {
        d if d < 7 => 0.0,
        d if d < 14 => 5.0,
        d if d < 30 => 10.0,
        _ => 15.0,
    }
}

pub fn score_recipe<'a>(recipe: &'a Recipe, request: &SuggestRequest, today: NaiveDate) -> ScoredRecipe<'a> {
    let rating = match recipe.rating {
        Some(r) if r > 0.0 => (r / 5.0).min(1.0) * 20.0,
        _ => 10.0,
    };
    let (fit, suggested_servings) = macro_fit(recipe, request.target_calories, request.target_protein);
    let mut variety = 10.0;
    if recipe.tried {
        variety += 2.5;
    }
    if recipe.favorite {
        variety += 2.5;
    }
    let breakdown = ScoreBreakdown {
        pantry: pantry_overlap(recipe, &request.available) * 30.0,
        rating,
        recency: recency_score(recipe.last_made.as_deref(), today),
        macro_fit: fit * 20.0,
        variety,
    };
    ScoredRecipe {
        recipe,
        score: round1(breakdown.total()),
        suggested_servings,
        breakdown,
    }
}

/// Filters the corpus and returns the top `request.limit` recipes by score.
pub fn suggest_recipes<'a>(recipes: &'a [Recipe], request: &SuggestRequest, today: NaiveDate) -> Vec<ScoredRecipe<'a>> {
    let mut scored: Vec<ScoredRecipe<'a>> = filter_recipes(recipes, &request.filter)
        .into_iter()
        .map(|r| score_recipe(r, request, today))
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(request.limit);
    scored
}

pub fn format_table(scored: &[ScoredRecipe<'_>]) -> String {
    let header = format!(
        "{:<3} {:<6} {:<5} {:<6} {:<6} {:<6} {}",
        "#", "Score", "Svgs", "Cal", "Pro", "Time", "Recipe"
    );
    let mut lines = vec![header.clone(), "-".repeat(header.len())];
    for (i, s) in scored.iter().enumerate() {
        let r = s.recipe;
        let cal = r.calories.map_or("?".to_string(), |c| format!("{:.0}", c));
        let pro = r.protein_g.map_or("?".to_string(), |p| format!("{:.0}g", p));
        let time = r.total_time_min.map_or("?".to_string(), |t| format!("{}m", t));
        lines.push(format!(
            "{:<3} {:<6.1} {:<5.1} {:<6} {:<6} {:<6} {}",
            i + 1,
            s.score,
            s.suggested_servings,
            cal,
            pro,
            time,
            r.name
        ));
    }
    lines.join("\n")
}

pub fn format_json(scored: &[ScoredRecipe<'_>]) -> serde_json::Result<String> {
    let data: Vec<serde_json::Value> = scored
        .iter()
        .map(|s| {
            let r = s.recipe;
            let b = s.breakdown;
            json!({
                "name": r.name,
                "file": r.file_path.display().to_string(),
                "calories": r.calories,
                "protein_g": r.protein_g,
                "servings": r.servings,
                "total_time_min": r.total_time_min,
                "meal_type": r.meal_type,
                "cuisine": r.cuisine,
                "suggested_servings": s.suggested_servings,
                "score": s.score,
                "score_breakdown": {
                    "pantry": round1(b.pantry),
                    "rating": round1(b.rating),
                    "recency": round1(b.recency),
                    "macro_fit": round1(b.macro_fit),
                    "variety": round1(b.variety),
                },
            })
        })
        .collect();
    serde_json::to_string_pretty(&data)
}
