use crate::config::NutritionConfig;
use crate::models::{MealType, NutrientTarget};
use std::collections::BTreeMap;

/// Splits the daily calorie and protein targets across the enabled meals.
///
/// # Arguments
/// * `nutrition`: daily targets and the per-meal allocation fractions.
/// * `meals`: the meals served each day; others get no target.
///
/// # Returns
/// One `NutrientTarget` per enabled meal, `daily * allocation`.
pub fn meal_targets(nutrition: &NutritionConfig, meals: &[MealType]) -> BTreeMap<MealType, NutrientTarget> {
    meals
        .iter()
        .map(|meal| {
            let share = nutrition.meal_allocation.get(*meal);
            let target = NutrientTarget {
                calories: nutrition.daily_calories as f64 * share,
                protein_g: nutrition.daily_protein_g as f64 * share,
            };
            (*meal, target)
        })
        .collect()
}

/// A meal target in the solver's scaled units (value * 100).
pub fn scaled_target(target: &NutrientTarget) -> (i64, i64) {
    ((target.calories * 100.0).round() as i64, (target.protein_g * 100.0).round() as i64)
}
