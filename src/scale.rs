use crate::models::Recipe;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

const MIN_MATCH_SCORE: f64 = 0.4;
const SUBSTRING_SCORE: f64 = 0.8;

/// Kitchen fractions a scaled quantity snaps to. 0 and 1 carry no suffix.
const FRACTIONS: [(f64, &str); 8] = [
    (0.0, ""),
    (1.0 / 8.0, "1/8"),
    (1.0 / 4.0, "1/4"),
    (1.0 / 3.0, "1/3"),
    (1.0 / 2.0, "1/2"),
    (2.0 / 3.0, "2/3"),
    (3.0 / 4.0, "3/4"),
    (1.0, ""),
];

/// `2 * matches / total` over the longest common subsequence of characters.
fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    2.0 * prev[b.len()] as f64 / (a.len() + b.len()) as f64
}

/// Best recipe for a loosely typed name.
///
/// An exact (case-insensitive) name wins outright. Otherwise names are scored
/// by character similarity, with containment in either direction worth at
/// least 0.8, and the best score above 0.4 is returned.
pub fn fuzzy_match_recipe<'a>(query: &str, recipes: &'a [Recipe]) -> Option<&'a Recipe> {
    let query = query.trim().to_lowercase();
    if let Some(exact) = recipes.iter().find(|r| r.name.to_lowercase() == query) {
        return Some(exact);
    }

    let mut best: Option<(f64, &Recipe)> = None;
    for recipe in recipes {
        let name = recipe.name.to_lowercase();
        let mut score = name_similarity(&query, &name);
        if name.contains(&query) || query.contains(&name) {
            score = score.max(SUBSTRING_SCORE);
        }
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, recipe));
        }
    }
    best.filter(|(score, _)| *score > MIN_MATCH_SCORE)
        .map(|(_, recipe)| recipe)
}

/// Renders a quantity as a whole number plus the nearest kitchen fraction.
pub fn round_to_fraction(qty: f64) -> String {
    if qty == 0.0 {
        return "0".to_string();
    }
    let mut whole = qty.trunc() as i64;
    let frac = qty - whole as f64;
    let (value, label) = FRACTIONS
        .iter()
        .copied()
        .min_by(|a, b| (frac - a.0).abs().total_cmp(&(frac - b.0).abs()))
        .unwrap_or((0.0, ""));
    if value >= 1.0 {
        whole += 1;
    }
    match (whole > 0, label.is_empty()) {
        (true, false) => format!("{} {}", whole, label),
        (true, true) => whole.to_string(),
        (false, false) => label.to_string(),
        (false, true) => format!("{:.2}", qty),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledItem {
    pub item: String,
    pub original_qty: Option<f64>,
    pub original_unit: Option<String>,
    pub scaled_qty: Option<f64>,
    pub scaled_qty_display: String,
    pub unit: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledSection {
    pub section: Option<String>,
    pub items: Vec<ScaledItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledRecipe {
    pub name: String,
    pub base_servings: u32,
    pub target_servings: f64,
    pub scale_factor: f64,
    pub calories_per_serving: Option<f64>,
    pub protein_per_serving: Option<f64>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub sections: Vec<ScaledSection>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Multiplies every parsed quantity by `target_servings / base servings`.
/// A recipe without a servings count is treated as serving one.
pub fn scale_recipe(recipe: &Recipe, target_servings: f64) -> ScaledRecipe {
    let base_servings = recipe.servings.filter(|s| *s > 0).unwrap_or(1);
    let factor = target_servings / base_servings as f64;

    let sections = recipe
        .parsed_ingredients
        .iter()
        .map(|section| ScaledSection {
            section: section.section.clone(),
            items: section
                .items
                .iter()
                .map(|item| {
                    let scaled_qty = item.qty.map(|q| q * factor);
                    ScaledItem {
                        item: item.item.clone(),
                        original_qty: item.qty,
                        original_unit: item.unit.clone(),
                        scaled_qty,
                        scaled_qty_display: scaled_qty.map(round_to_fraction).unwrap_or_default(),
                        unit: item.unit.clone().unwrap_or_default(),
                        notes: item.notes.clone(),
                    }
                })
                .collect(),
        })
        .collect();

    ScaledRecipe {
        name: recipe.name.clone(),
        base_servings,
        target_servings,
        scale_factor: round_to(factor, 2),
        calories_per_serving: recipe.calories,
        protein_per_serving: recipe.protein_g,
        total_calories: recipe.calories.map(|c| round_to(c * target_servings, 1)),
        total_protein: recipe.protein_g.map(|p| round_to(p * target_servings, 1)),
        sections,
    }
}

/// One markdown bullet per scaled ingredient, under a bold section label.
pub(crate) fn write_scaled_items(out: &mut String, data: &ScaledRecipe, parenthesized_notes: bool) {
    for section in &data.sections {
        if let Some(name) = section.section.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "**{}**", name);
            let _ = writeln!(out);
        }
        for item in &section.items {
            let unit = if item.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", item.unit)
            };
            let notes = match item.notes.as_deref() {
                Some(n) if parenthesized_notes => format!(" ({})", n),
                Some(n) => format!(", {}", n),
                None => String::new(),
            };
            if item.scaled_qty_display.is_empty() {
                let _ = writeln!(out, "- {}{}", item.item, notes);
            } else {
                let _ = writeln!(out, "- {}{} {}{}", item.scaled_qty_display, unit, item.item, notes);
            }
        }
        let _ = writeln!(out);
    }
}

pub fn format_scaled_markdown(data: &ScaledRecipe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} (Scaled to {} servings)", data.name, data.target_servings);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Base:** {} servings | **Scale:** {}x",
        data.base_servings, data.scale_factor
    );
    let protein = |p: Option<f64>| p.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string());
    if let Some(calories) = data.calories_per_serving {
        let _ = writeln!(
            out,
            "**Per serving:** {} cal, {}g protein",
            calories,
            protein(data.protein_per_serving)
        );
    }
    if let Some(calories) = data.total_calories {
        let _ = writeln!(out, "**Total:** {} cal, {}g protein", calories, protein(data.total_protein));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Ingredients");
    let _ = writeln!(out);
    write_scaled_items(&mut out, data, true);
    out
}

pub fn format_scaled_json(data: &ScaledRecipe) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize scaled recipe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngredientSection, ParsedIngredient};

    fn ingredient(qty: Option<f64>, unit: Option<&str>, item: &str, notes: Option<&str>) -> ParsedIngredient {
        ParsedIngredient {
            qty,
            unit: unit.map(|u| u.to_string()),
            item: item.to_string(),
            notes: notes.map(|n| n.to_string()),
        }
    }

    fn chili() -> Recipe {
        let mut r = Recipe::new("Black Bean Chili");
        r.servings = Some(4);
        r.calories = Some(520.0);
        r.protein_g = Some(28.0);
        r.parsed_ingredients = vec![
            IngredientSection {
                section: Some("Chili".to_string()),
                items: vec![
                    ingredient(Some(2.0), Some("cans"), "black beans", Some("drained")),
                    ingredient(Some(1.0), Some("tsp"), "cumin", None),
                ],
            },
            IngredientSection {
                section: None,
                items: vec![ingredient(None, None, "salt", Some("to taste"))],
            },
        ];
        r
    }

    #[test]
    fn test_round_to_fraction() {
        assert_eq!(round_to_fraction(0.0), "0");
        assert_eq!(round_to_fraction(0.5), "1/2");
        assert_eq!(round_to_fraction(1.25), "1 1/4");
        assert_eq!(round_to_fraction(2.0), "2");
        assert_eq!(round_to_fraction(0.3), "1/3");
        assert_eq!(round_to_fraction(1.95), "2");
        assert_eq!(round_to_fraction(0.02), "0.02");
    }

    #[test]
    fn test_scale_recipe_halves_quantities() {
        let data = scale_recipe(&chili(), 2.0);
        assert_eq!(data.base_servings, 4);
        assert_eq!(data.scale_factor, 0.5);
        assert_eq!(data.total_calories, Some(1040.0));
        let beans = &data.sections[0].items[0];
        assert_eq!(beans.scaled_qty, Some(1.0));
        assert_eq!(beans.scaled_qty_display, "1");
        assert_eq!(data.sections[0].items[1].scaled_qty_display, "1/2");
        assert_eq!(data.sections[1].items[0].scaled_qty, None);
        assert_eq!(data.sections[1].items[0].scaled_qty_display, "");
    }

    #[test]
    fn test_missing_servings_counts_as_one() {
        let mut recipe = chili();
        recipe.servings = None;
        let data = scale_recipe(&recipe, 3.0);
        assert_eq!(data.base_servings, 1);
        assert_eq!(data.sections[0].items[0].scaled_qty, Some(6.0));
    }

    #[test]
    fn test_fuzzy_match_recipe() {
        let recipes = vec![
            Recipe::new("Black Bean Chili"),
            Recipe::new("Chicken Tikka Masala"),
            Recipe::new("Pad See Ew"),
        ];
        let name = |q: &str| fuzzy_match_recipe(q, &recipes).map(|r| r.name.as_str());
        assert_eq!(name("pad see ew"), Some("Pad See Ew"));
        assert_eq!(name("tikka"), Some("Chicken Tikka Masala"));
        assert_eq!(name("Black Been Chilli"), Some("Black Bean Chili"));
        assert_eq!(name("zzzz"), None);
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("abc", "abc"), 1.0);
        assert_eq!(name_similarity("abcd", "abxy"), 0.5);
        assert_eq!(name_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_scaled_markdown() {
        let md = format_scaled_markdown(&scale_recipe(&chili(), 2.0));
        assert!(md.starts_with("# Black Bean Chili (Scaled to 2 servings)\n"));
        assert!(md.contains("**Base:** 4 servings | **Scale:** 0.5x"));
        assert!(md.contains("**Per serving:** 520 cal, 28g protein"));
        assert!(md.contains("**Total:** 1040 cal, 56g protein"));
        assert!(md.contains("**Chili**\n\n- 1 cans black beans (drained)\n- 1/2 tsp cumin\n"));
        assert!(md.contains("- salt (to taste)"));
    }
}
