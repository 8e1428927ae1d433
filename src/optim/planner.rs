//! Builds the weekly model from pools, pins and configuration, solves it,
//! and hands the solution to the assembler.

use super::assembler::{assemble_plan, PlanHeader, SlotPlan};
use super::groups::GroupTable;
use super::model::{
    ChoiceVar, DeviationObjective, MealModel, NutritionTable, ServingVar, SolveStatus, Solver,
    TableId,
};
use super::pins::{resolve_pins, PinSpec, ResolvedPin};
use super::pools::{build_candidate_pools, PoolSet};
use super::targets::{meal_targets, scaled_target};
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::models::{day_name, weekday_index, MealPlan, MealType, NutrientTarget, PrepStyle, Recipe};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a planning run that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(MealPlan),
    /// The solver returned no assignment; carries its status.
    Unsolved(SolveStatus),
}

/// Plan-relative indices of the configured cook days.
///
/// Unknown names and days past the horizon are ignored. If nothing is left,
/// every day becomes a cook day.
pub fn resolve_cook_days(names: &[String], num_days: usize) -> Vec<usize> {
    let days: BTreeSet<usize> = names
        .iter()
        .filter_map(|name| {
            let index = weekday_index(name);
            if index.is_none() {
                debug!(day = %name, "Ignoring unknown cook day");
            }
            index
        })
        .filter(|d| *d < num_days)
        .collect();
    if days.is_empty() {
        warn!(
            configured = ?names,
            "No cook day falls inside the plan, cooking dinner every day"
        );
        return (0..num_days).collect();
    }
    days.into_iter().collect()
}

/// The cook day whose dinner is eaten as leftovers before `day`: the latest
/// cook day strictly earlier, wrapping to the last cook day when none is.
///
/// Leftover dinner on day d reads `leftover_source(cooks, d)`; leftover lunch
/// on day d eats the previous day's dinner, `leftover_source(cooks, d)` for
/// d > 0 and `leftover_source(cooks, num_days)` on the first day.
pub fn leftover_source(cook_days: &[usize], day: usize) -> Option<usize> {
    cook_days
        .iter()
        .rev()
        .find(|c| **c < day)
        .or_else(|| cook_days.iter().max())
        .copied()
}

/// A solver-ready model plus the cell layout needed to read the answer back.
#[derive(Debug, Clone)]
pub struct PlanModel {
    pub model: MealModel,
    pub layout: Vec<SlotPlan>,
}

struct Decision {
    choice: ChoiceVar,
    serving: ServingVar,
}

struct ModelBuilder<'p, 'a> {
    model: MealModel,
    pools: &'p PoolSet<'a>,
    tables: HashMap<MealType, TableId>,
    hints: BTreeMap<MealType, NutrientTarget>,
}

impl<'p, 'a> ModelBuilder<'p, 'a> {
    fn table(&mut self, meal: MealType) -> TableId {
        if let Some(id) = self.tables.get(&meal) {
            return *id;
        }
        let table = NutritionTable::from_recipes(self.pools.get(meal).recipes());
        let id = self.model.add_table(table);
        self.tables.insert(meal, id);
        id
    }

    fn decision(&mut self, meal: MealType, label: &str) -> Decision {
        let size = self.pools.get(meal).len();
        let choice = self.model.add_choice(format!("{}_recipe_{}", meal, label), size);
        let serving = self.model.add_serving(format!("{}_servings_{}", meal, label));
        if let Some(target) = self.hints.get(&meal) {
            let (calories, protein) = scaled_target(target);
            self.model.set_hint(choice, calories, protein);
        }
        Decision { choice, serving }
    }

    fn add_cell(&mut self, layout: &mut Vec<SlotPlan>, cell: SlotPlan) {
        let table = self.table(cell.pool);
        self.model.contribute(cell.day, cell.choice, table, cell.serving);
        layout.push(cell);
    }
}

/// Lays out the decision variables, contributions and constraints for one run.
pub fn build_plan_model(
    pools: &PoolSet<'_>,
    pins: &[ResolvedPin<'_>],
    config: &PlannerConfig,
    cook_days: &[usize],
    groups: &GroupTable,
    targets: BTreeMap<MealType, NutrientTarget>,
) -> PlanModel {
    let num_days = config.schedule.plan_days;
    let styles = &config.prep_styles;
    let batch_breakfast = styles.breakfast == PrepStyle::Batch;
    let leftover_lunch = styles.lunch == PrepStyle::Leftover;
    let snacks = config.snacks_enabled();

    let objective = DeviationObjective::daily(
        config.nutrition.daily_calories,
        config.nutrition.daily_protein_g,
        config.solver.calorie_weight,
        config.solver.protein_weight,
    );
    let mut builder = ModelBuilder {
        model: MealModel::new(num_days, objective),
        pools,
        tables: HashMap::new(),
        hints: targets,
    };

    // Decision variables, keyed by the (meal, day) cells they decide.
    let mut decisions: HashMap<(MealType, usize), ChoiceVar> = HashMap::new();
    let mut per_meal: BTreeMap<MealType, Vec<ChoiceVar>> = BTreeMap::new();

    let breakfast: Vec<(ChoiceVar, ServingVar)> = if batch_breakfast {
        let d = builder.decision(MealType::Breakfast, "all");
        per_meal.entry(MealType::Breakfast).or_default().push(d.choice);
        vec![(d.choice, d.serving); num_days]
    } else {
        (0..num_days)
            .map(|day| {
                let d = builder.decision(MealType::Breakfast, &format!("d{}", day));
                per_meal.entry(MealType::Breakfast).or_default().push(d.choice);
                (d.choice, d.serving)
            })
            .collect()
    };
    for (day, (choice, _)) in breakfast.iter().enumerate() {
        decisions.insert((MealType::Breakfast, day), *choice);
    }

    let dinner_days: Vec<usize> = if styles.dinner == PrepStyle::Fresh {
        cook_days.to_vec()
    } else {
        (0..num_days).collect()
    };
    let mut dinners: BTreeMap<usize, Decision> = BTreeMap::new();
    for &day in &dinner_days {
        let d = builder.decision(MealType::Dinner, &format!("d{}", day));
        decisions.insert((MealType::Dinner, day), d.choice);
        per_meal.entry(MealType::Dinner).or_default().push(d.choice);
        dinners.insert(day, d);
    }

    let mut lunches: BTreeMap<usize, Decision> = BTreeMap::new();
    if !leftover_lunch {
        for day in 0..num_days {
            let d = builder.decision(MealType::Lunch, &format!("d{}", day));
            decisions.insert((MealType::Lunch, day), d.choice);
            per_meal.entry(MealType::Lunch).or_default().push(d.choice);
            lunches.insert(day, d);
        }
    }

    let mut snack_vars: BTreeMap<usize, Decision> = BTreeMap::new();
    if snacks {
        for day in 0..num_days {
            let d = builder.decision(MealType::Snack, &format!("d{}", day));
            decisions.insert((MealType::Snack, day), d.choice);
            per_meal.entry(MealType::Snack).or_default().push(d.choice);
            snack_vars.insert(day, d);
        }
    }

    // Pins fix decisions. Cells without a decision of their own are skipped,
    // but every (meal, day) a pin names is still marked pinned.
    let mut pinned_cells: HashSet<(MealType, usize)> = HashSet::new();
    let mut pinned_vars: HashSet<ChoiceVar> = HashSet::new();
    for pin in pins {
        for &day in &pin.days {
            pinned_cells.insert((pin.meal_type, day));
            match decisions.get(&(pin.meal_type, day)) {
                Some(var) => {
                    builder.model.fix(*var, pin.candidate_index);
                    pinned_vars.insert(*var);
                }
                None => match pin.meal_type {
                    MealType::Snack => {
                        warn!(day = %day_name(day), recipe = %pin.recipe.name, "Snacks not enabled, pin skipped")
                    }
                    meal => warn!(
                        day = %day_name(day),
                        meal = %meal,
                        recipe = %pin.recipe.name,
                        "Slot is a leftover slot, pin skipped"
                    ),
                },
            }
        }
    }

    // Cells in serving order: breakfast, lunch, dinner, snack.
    let mut layout = Vec::new();
    for day in 0..num_days {
        let pinned = |meal: MealType| pinned_cells.contains(&(meal, day));

        let (choice, serving) = breakfast[day];
        let cell = SlotPlan {
            day,
            meal_type: MealType::Breakfast,
            prep_style: if batch_breakfast { PrepStyle::Batch } else { PrepStyle::Fresh },
            choice,
            serving,
            pool: MealType::Breakfast,
            pinned: pinned(MealType::Breakfast),
        };
        builder.add_cell(&mut layout, cell);

        if let Some(d) = lunches.get(&day) {
            let cell = SlotPlan {
                day,
                meal_type: MealType::Lunch,
                prep_style: PrepStyle::Fresh,
                choice: d.choice,
                serving: d.serving,
                pool: MealType::Lunch,
                pinned: pinned(MealType::Lunch),
            };
            builder.add_cell(&mut layout, cell);
        } else {
            let before = if day == 0 { num_days } else { day };
            if let Some(source) = leftover_source(&dinner_days, before).and_then(|c| dinners.get(&c)) {
                let serving = builder
                    .model
                    .add_serving(format!("lunch_leftover_servings_d{}", day));
                let cell = SlotPlan {
                    day,
                    meal_type: MealType::Lunch,
                    prep_style: PrepStyle::Leftover,
                    choice: source.choice,
                    serving,
                    pool: MealType::Dinner,
                    pinned: pinned(MealType::Lunch),
                };
                builder.add_cell(&mut layout, cell);
            }
        }

        if let Some(d) = dinners.get(&day) {
            let cell = SlotPlan {
                day,
                meal_type: MealType::Dinner,
                prep_style: PrepStyle::Fresh,
                choice: d.choice,
                serving: d.serving,
                pool: MealType::Dinner,
                pinned: pinned(MealType::Dinner),
            };
            builder.add_cell(&mut layout, cell);
        } else if let Some(source) = leftover_source(&dinner_days, day).and_then(|c| dinners.get(&c)) {
            let serving = builder
                .model
                .add_serving(format!("dinner_leftover_servings_d{}", day));
            let cell = SlotPlan {
                day,
                meal_type: MealType::Dinner,
                prep_style: PrepStyle::Leftover,
                choice: source.choice,
                serving,
                pool: MealType::Dinner,
                pinned: pinned(MealType::Dinner),
            };
            builder.add_cell(&mut layout, cell);
        }

        if let Some(d) = snack_vars.get(&day) {
            let cell = SlotPlan {
                day,
                meal_type: MealType::Snack,
                prep_style: PrepStyle::Fresh,
                choice: d.choice,
                serving: d.serving,
                pool: MealType::Snack,
                pinned: pinned(MealType::Snack),
            };
            builder.add_cell(&mut layout, cell);
        }
    }

    let unpinned = |meal: MealType| -> Vec<ChoiceVar> {
        per_meal
            .get(&meal)
            .map(|vars| vars.iter().filter(|v| !pinned_vars.contains(*v)).copied().collect())
            .unwrap_or_default()
    };

    for meal in [MealType::Dinner, MealType::Lunch, MealType::Snack] {
        let vars = unpinned(meal);
        if vars.len() > 1 {
            builder.model.all_different(vars);
        }
    }

    let free_dinners = unpinned(MealType::Dinner);
    if free_dinners.len() > 1 && groups.num_groups > 1 {
        builder
            .model
            .all_different_by(free_dinners.clone(), groups.group_ids.clone());
    }
    if !free_dinners.is_empty() {
        for group in &config.preferences.required_ingredient_groups {
            match groups.named_group_id(group) {
                Some(id) => {
                    builder
                        .model
                        .at_least_one(free_dinners.clone(), groups.group_ids.clone(), id)
                }
                None => warn!(group = %group, "No dinner candidates in required ingredient group, skipping"),
            }
        }
    }

    debug!(
        choices = builder.model.choice_count(),
        servings = builder.model.serving_count(),
        constraints = builder.model.constraints().len(),
        "Plan model built"
    );

    PlanModel {
        model: builder.model,
        layout,
    }
}

/// Filters the corpus into pools, resolves pins, builds and solves the model,
/// and assembles the plan.
///
/// # Arguments
/// * `recipes`: the full corpus; pins may pull recipes from it into a pool.
/// * `exclude`: recipe-name substrings to drop from every pool.
/// * `start_date`: calendar date of day 0, if the plan is dated.
///
/// # Returns
/// `PlanOutcome::Unsolved` when the solver finds no assignment in time;
/// validation and lookup failures are errors.
pub fn build_meal_plan(
    recipes: &[Recipe],
    config: &PlannerConfig,
    exclude: &[String],
    pins: &[PinSpec],
    start_date: Option<NaiveDate>,
    solver: &dyn Solver,
) -> Result<PlanOutcome, PlanError> {
    let limit_seconds = config.solver.time_limit_seconds;
    let time_limit = Duration::try_from_secs_f64(limit_seconds)
        .ok()
        .filter(|limit| !limit.is_zero())
        .ok_or_else(|| PlanError::InvalidTimeLimit(limit_seconds.to_string()))?;
    let num_days = config.schedule.plan_days;
    let batch_breakfast = config.prep_styles.breakfast == PrepStyle::Batch;

    let pools = build_candidate_pools(recipes, config, exclude);
    let (pools, resolved) = resolve_pins(pins, pools, recipes, num_days, batch_breakfast)?;

    let mut meals = vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner];
    if config.snacks_enabled() {
        meals.push(MealType::Snack);
    }
    if let Some(meal) = meals.iter().find(|m| pools.get(**m).is_empty()) {
        return Err(PlanError::EmptyPool(*meal));
    }

    let targets = meal_targets(&config.nutrition, &meals);
    let cook_days = resolve_cook_days(&config.schedule.cook_days, num_days);
    let groups = GroupTable::build(pools.dinner.recipes());

    let plan_model = build_plan_model(&pools, &resolved, config, &cook_days, &groups, targets.clone());

    let started = Instant::now();
    let solution = solver.solve(&plan_model.model, time_limit);
    info!(
        status = ?solution.status,
        objective = ?solution.objective,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Solver finished"
    );

    if !solution.status.has_solution() {
        return Ok(PlanOutcome::Unsolved(solution.status));
    }

    let header = PlanHeader {
        start_date,
        days: num_days,
        calories_target: config.nutrition.daily_calories,
        protein_target: config.nutrition.daily_protein_g,
        meal_targets: targets,
    };
    Ok(PlanOutcome::Planned(assemble_plan(
        header,
        &plan_model.layout,
        &pools,
        &solution,
    )))
}
