use crate::models::{MealPlan, MealSlot};
use crate::scale::{scale_recipe, write_scaled_items};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlanFormat {
    Markdown,
    Json,
    Csv,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn date_or_blank(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// One plan slot as written to JSON and CSV.
#[derive(Debug, Serialize)]
struct SlotRow<'a> {
    day: usize,
    day_name: &'a str,
    date: String,
    meal_type: &'static str,
    prep_style: &'static str,
    recipe: &'a str,
    recipe_file: String,
    servings: f64,
    calories: f64,
    protein_g: f64,
    pinned: bool,
}

impl<'a> From<&'a MealSlot> for SlotRow<'a> {
    fn from(slot: &'a MealSlot) -> Self {
        Self {
            day: slot.day,
            day_name: &slot.day_name,
            date: date_or_blank(slot.date),
            meal_type: slot.meal_type.as_str(),
            prep_style: slot.prep_style.as_str(),
            recipe: &slot.recipe.name,
            recipe_file: slot.recipe.file_path.display().to_string(),
            servings: slot.servings,
            calories: round1(slot.calories),
            protein_g: round1(slot.protein_g),
            pinned: slot.pinned,
        }
    }
}

/// Obsidian note: front matter, one table per day, and a summary.
pub fn format_plan_markdown(plan: &MealPlan, created: NaiveDate) -> String {
    let start = date_or_blank(plan.start_date);
    let end = date_or_blank(plan.end_date);
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "---");
    let _ = writeln!(out, "type: meal-plan");
    let _ = writeln!(out, "date_created: {}", created.format("%Y-%m-%d"));
    let _ = writeln!(out, "start_date: {}", start);
    let _ = writeln!(out, "end_date: {}", end);
    let _ = writeln!(out, "daily_calories_target: {}", plan.calories_target);
    let _ = writeln!(out, "daily_protein_target: {}", plan.protein_target);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(out, "# Meal Plan: {} to {}", start, end);
    let _ = writeln!(out);

    for day in 0..plan.days {
        let slots: Vec<&MealSlot> = plan.slots_for_day(day).collect();
        let Some(first) = slots.first() else {
            continue;
        };
        let _ = writeln!(out, "## {}", first.day_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Meal | Recipe | Calories | Protein | Prep |");
        let _ = writeln!(out, "|------|--------|----------|---------|------|");
        for slot in &slots {
            let servings = if slot.servings != 1.0 {
                format!(" ({:.1}x)", slot.servings)
            } else {
                String::new()
            };
            let prep = if slot.pinned {
                format!("{} (pinned)", slot.prep_style)
            } else {
                slot.prep_style.to_string()
            };
            let _ = writeln!(
                out,
                "| {} | [[{}]]{} | {:.0} | {:.0}g | {} |",
                slot.meal_type.title(),
                slot.recipe.name,
                servings,
                slot.calories,
                slot.protein_g,
                prep
            );
        }
        let _ = writeln!(
            out,
            "| **Total** | | **{:.0}** | **{:.0}g** | |",
            plan.day_calories(day),
            plan.day_protein(day)
        );
        let _ = writeln!(out);
    }

    let days = plan.days.max(1) as f64;
    let total_cal = plan.total_calories();
    let total_pro = plan.total_protein();
    let _ = writeln!(out, "## Weekly Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Total calories: ~{:.0} (avg {:.0}/day)", total_cal, total_cal / days);
    let _ = writeln!(out, "- Total protein: ~{:.0}g (avg {:.0}g/day)", total_pro, total_pro / days);
    let _ = writeln!(out, "- Cook sessions: {}", plan.cook_sessions());
    let _ = writeln!(out, "- Unique recipes: {}", plan.unique_recipes().len());
    out
}

pub fn format_plan_json(plan: &MealPlan) -> Result<String> {
    let meal_targets: serde_json::Map<String, serde_json::Value> = plan
        .meal_targets
        .iter()
        .map(|(meal, t)| {
            (
                meal.as_str().to_string(),
                json!({ "calories": round1(t.calories), "protein_g": round1(t.protein_g) }),
            )
        })
        .collect();
    let slots: Vec<SlotRow<'_>> = plan.slots.iter().map(SlotRow::from).collect();
    let data = json!({
        "start_date": plan.start_date,
        "end_date": plan.end_date,
        "days": plan.days,
        "calories_target": plan.calories_target,
        "protein_target": plan.protein_target,
        "meal_targets": meal_targets,
        "slots": slots,
    });
    serde_json::to_string_pretty(&data).context("Failed to serialize meal plan")
}

pub fn format_plan_csv(plan: &MealPlan) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for slot in &plan.slots {
        writer
            .serialize(SlotRow::from(slot))
            .with_context(|| format!("Failed to write CSV row for {} {}", slot.day_name, slot.meal_type))?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// A `## Recipes` section: each distinct (recipe, servings) pair once, with
/// its ingredients scaled to that many servings and its directions.
pub fn format_plan_recipes(plan: &MealPlan) -> String {
    let mut seen: HashSet<(&str, i64)> = HashSet::new();
    let mut out = String::new();
    for slot in &plan.slots {
        // servings are multiples of 0.1
        let key = (slot.recipe.name.as_str(), (slot.servings * 10.0).round() as i64);
        if !seen.insert(key) {
            continue;
        }
        if out.is_empty() {
            let _ = writeln!(out, "## Recipes");
            let _ = writeln!(out);
        }
        let recipe = &slot.recipe;
        let _ = writeln!(out, "### {} ({:.1}x)", recipe.name, slot.servings);
        let _ = writeln!(out);
        if recipe.parsed_ingredients.is_empty() {
            let _ = writeln!(out, "*Recipe ingredients not available. Run `meal_optim index` first.*");
            let _ = writeln!(out);
            continue;
        }

        let base = recipe.servings.filter(|s| *s > 0).unwrap_or(1) as f64;
        let scaled = scale_recipe(recipe, slot.servings * base);
        let _ = writeln!(out, "#### Ingredients");
        let _ = writeln!(out);
        write_scaled_items(&mut out, &scaled, false);

        if let Some(directions) = recipe.directions.as_deref() {
            let _ = writeln!(out, "#### Directions");
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", directions);
            let _ = writeln!(out);
        }
    }
    out
}

pub fn format_plan(plan: &MealPlan, format: PlanFormat, created: NaiveDate) -> Result<String> {
    match format {
        PlanFormat::Markdown => Ok(format_plan_markdown(plan, created)),
        PlanFormat::Json => format_plan_json(plan),
        PlanFormat::Csv => format_plan_csv(plan),
    }
}
