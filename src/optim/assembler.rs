use super::model::{ChoiceVar, ServingVar, Solution, FIXED_POINT};
use super::pools::PoolSet;
use crate::models::{day_name, MealPlan, MealSlot, MealType, NutrientTarget, PrepStyle};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use tracing::warn;

/// Where one (day, meal) cell of the plan reads its recipe and servings from.
///
/// Leftover cells point at the choice variable of the dinner they reuse, so
/// the recipe shown is exactly the one decided for that cook day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub day: usize,
    pub meal_type: MealType,
    pub prep_style: PrepStyle,
    pub choice: ChoiceVar,
    pub serving: ServingVar,
    /// Pool the choice indexes into. Leftover lunches read the dinner pool.
    pub pool: MealType,
    pub pinned: bool,
}

/// Plan-level facts that do not come from the solver.
#[derive(Debug, Clone)]
pub struct PlanHeader {
    pub start_date: Option<NaiveDate>,
    pub days: usize,
    pub calories_target: u32,
    pub protein_target: u32,
    pub meal_targets: BTreeMap<MealType, NutrientTarget>,
}

fn offset(start: Option<NaiveDate>, days: usize) -> Option<NaiveDate> {
    start.and_then(|s| s.checked_add_days(Days::new(days as u64)))
}

/// Turns a solved model into meal slots.
///
/// Calories and protein are recomputed from the recipe's per-serving values
/// so fixed-point truncation never reaches the output.
pub fn assemble_plan(
    header: PlanHeader,
    layout: &[SlotPlan],
    pools: &PoolSet<'_>,
    solution: &Solution,
) -> MealPlan {
    let mut slots = Vec::with_capacity(layout.len());

    for cell in layout {
        let recipe = solution
            .choice(cell.choice)
            .and_then(|index| pools.get(cell.pool).get(index));
        let Some(recipe) = recipe else {
            warn!(day = cell.day, meal = %cell.meal_type, "Solution has no recipe for slot");
            continue;
        };
        let servings = solution.serving(cell.serving).unwrap_or(FIXED_POINT) as f64 / FIXED_POINT as f64;

        slots.push(MealSlot {
            day: cell.day,
            day_name: day_name(cell.day),
            date: offset(header.start_date, cell.day),
            meal_type: cell.meal_type,
            prep_style: cell.prep_style,
            recipe: recipe.clone(),
            servings,
            calories: recipe.calories.unwrap_or(0.0) * servings,
            protein_g: recipe.protein_g.unwrap_or(0.0) * servings,
            pinned: cell.pinned,
        });
    }

    MealPlan {
        start_date: header.start_date,
        end_date: offset(header.start_date, header.days.saturating_sub(1)),
        days: header.days,
        calories_target: header.calories_target,
        protein_target: header.protein_target,
        meal_targets: header.meal_targets,
        slots,
    }
}
