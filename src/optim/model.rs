//! Solver-independent description of the plan optimization problem.
//!
//! A model is a set of integer choice variables (recipe indices into a pool),
//! serving variables (servings in tenths), per-pool nutrition tables, and
//! per-day contributions `table[choice] * serving`. The objective is the
//! weighted absolute deviation of each day's totals from the daily targets.
//! Any backend implementing [`Solver`] can optimize it.

use crate::models::Recipe;
use std::time::Duration;

/// Fixed-point factor for nutrition values and servings.
pub const FIXED_POINT: i64 = 10;

/// Allowed servings in tenths: 0.5, 1.0, ... 4.0.
pub const SERVING_OPTIONS: [i64; 8] = [5, 10, 15, 20, 25, 30, 35, 40];

/// Upper bound on a single meal's scaled calories or protein (1000 kcal / 1000 g).
pub const MEAL_CAP: i64 = 100_000;

/// A day's deviation may not exceed this multiple of its target.
pub const DEVIATION_CAP_FACTOR: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChoiceVar(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServingVar(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) usize);

/// Per-candidate calories and protein, scaled by [`FIXED_POINT`] and truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NutritionTable {
    pub calories: Vec<i64>,
    pub protein: Vec<i64>,
}

impl NutritionTable {
    pub fn from_recipes(recipes: &[&Recipe]) -> Self {
        let scale = |v: Option<f64>| (v.unwrap_or(0.0) * FIXED_POINT as f64) as i64;
        Self {
            calories: recipes.iter().map(|r| scale(r.calories)).collect(),
            protein: recipes.iter().map(|r| scale(r.protein_g)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.calories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calories.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceDecl {
    pub name: String,
    pub domain: Vec<usize>,
    /// Scaled (calories, protein) the value-ordering heuristic aims for.
    pub hint: Option<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServingDecl {
    pub name: String,
    pub options: Vec<i64>,
}

/// `table[choice] * serving` added to one day's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub choice: ChoiceVar,
    pub table: TableId,
    pub serving: ServingVar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// No two variables take values in the same class. `classes` maps a
    /// value to its class; `None` means the value is its own class.
    AllDifferent {
        vars: Vec<ChoiceVar>,
        classes: Option<Vec<usize>>,
    },
    /// At least one variable takes a value whose class is `class`.
    AtLeastOne {
        vars: Vec<ChoiceVar>,
        classes: Vec<usize>,
        class: usize,
    },
}

impl Constraint {
    pub fn vars(&self) -> &[ChoiceVar] {
        match self {
            Constraint::AllDifferent { vars, .. } | Constraint::AtLeastOne { vars, .. } => vars,
        }
    }
}

pub(crate) fn class_of(classes: Option<&Vec<usize>>, value: usize) -> usize {
    match classes {
        Some(map) => map.get(value).copied().unwrap_or(usize::MAX),
        None => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationObjective {
    /// Daily targets in `FIXED_POINT^2` units.
    pub calorie_target: i64,
    pub protein_target: i64,
    pub calorie_weight: i64,
    pub protein_weight: i64,
}

impl DeviationObjective {
    pub fn daily(calories: u32, protein_g: u32, calorie_weight: i64, protein_weight: i64) -> Self {
        let scale = FIXED_POINT * FIXED_POINT;
        Self {
            calorie_target: calories as i64 * scale,
            protein_target: protein_g as i64 * scale,
            calorie_weight,
            protein_weight,
        }
    }

    /// Weighted deviation for one day's totals, or `None` past the deviation cap.
    pub fn day_cost(&self, calories: i64, protein: i64) -> Option<i64> {
        let cal_dev = (calories - self.calorie_target).abs();
        let pro_dev = (protein - self.protein_target).abs();
        if self.calorie_target > 0 && cal_dev > DEVIATION_CAP_FACTOR * self.calorie_target {
            return None;
        }
        if self.protein_target > 0 && pro_dev > DEVIATION_CAP_FACTOR * self.protein_target {
            return None;
        }
        Some(self.calorie_weight * cal_dev + self.protein_weight * pro_dev)
    }
}

pub fn within_meal_cap(calories: i64, protein: i64) -> bool {
    calories <= MEAL_CAP && protein <= MEAL_CAP
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealModel {
    pub(crate) num_days: usize,
    pub(crate) choices: Vec<ChoiceDecl>,
    pub(crate) servings: Vec<ServingDecl>,
    pub(crate) tables: Vec<NutritionTable>,
    pub(crate) days: Vec<Vec<Contribution>>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) objective: DeviationObjective,
}

impl MealModel {
    pub fn new(num_days: usize, objective: DeviationObjective) -> Self {
        Self {
            num_days,
            choices: Vec::new(),
            servings: Vec::new(),
            tables: Vec::new(),
            days: vec![Vec::new(); num_days],
            constraints: Vec::new(),
            objective,
        }
    }

    pub fn num_days(&self) -> usize {
        self.num_days
    }

    pub fn objective(&self) -> &DeviationObjective {
        &self.objective
    }

    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    pub fn serving_count(&self) -> usize {
        self.servings.len()
    }

    pub fn choice_decl(&self, var: ChoiceVar) -> &ChoiceDecl {
        &self.choices[var.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn contributions(&self, day: usize) -> &[Contribution] {
        &self.days[day]
    }

    pub fn add_table(&mut self, table: NutritionTable) -> TableId {
        self.tables.push(table);
        TableId(self.tables.len() - 1)
    }

    /// A recipe choice over `0..size`.
    pub fn add_choice(&mut self, name: impl Into<String>, size: usize) -> ChoiceVar {
        self.choices.push(ChoiceDecl {
            name: name.into(),
            domain: (0..size).collect(),
            hint: None,
        });
        ChoiceVar(self.choices.len() - 1)
    }

    pub fn add_serving(&mut self, name: impl Into<String>) -> ServingVar {
        self.servings.push(ServingDecl {
            name: name.into(),
            options: SERVING_OPTIONS.to_vec(),
        });
        ServingVar(self.servings.len() - 1)
    }

    pub fn set_hint(&mut self, var: ChoiceVar, calories: i64, protein: i64) {
        self.choices[var.0].hint = Some((calories, protein));
    }

    /// Restricts `var` to `value`. Fixing to a value outside the domain
    /// leaves the domain empty and the model infeasible.
    pub fn fix(&mut self, var: ChoiceVar, value: usize) {
        self.choices[var.0].domain.retain(|v| *v == value);
    }

    pub fn contribute(&mut self, day: usize, choice: ChoiceVar, table: TableId, serving: ServingVar) {
        self.days[day].push(Contribution {
            choice,
            table,
            serving,
        });
    }

    pub fn all_different(&mut self, vars: Vec<ChoiceVar>) {
        self.constraints.push(Constraint::AllDifferent { vars, classes: None });
    }

    pub fn all_different_by(&mut self, vars: Vec<ChoiceVar>, classes: Vec<usize>) {
        self.constraints.push(Constraint::AllDifferent {
            vars,
            classes: Some(classes),
        });
    }

    pub fn at_least_one(&mut self, vars: Vec<ChoiceVar>, classes: Vec<usize>, class: usize) {
        self.constraints.push(Constraint::AtLeastOne { vars, classes, class });
    }

    /// True when a complete choice assignment satisfies domains and constraints.
    pub fn is_feasible(&self, choices: &[usize]) -> bool {
        if choices.len() != self.choices.len() {
            return false;
        }
        let in_domain = self
            .choices
            .iter()
            .zip(choices)
            .all(|(decl, v)| decl.domain.contains(v));
        in_domain
            && self.constraints.iter().all(|c| match c {
                Constraint::AllDifferent { vars, classes } => {
                    let mut seen = std::collections::HashSet::new();
                    vars.iter()
                        .all(|v| seen.insert(class_of(classes.as_ref(), choices[v.0])))
                }
                Constraint::AtLeastOne { vars, classes, class } => vars
                    .iter()
                    .any(|v| class_of(Some(classes), choices[v.0]) == *class),
            })
    }

    /// Objective value of a complete assignment, or `None` if it breaks a cap.
    pub fn evaluate(&self, choices: &[usize], servings: &[i64]) -> Option<i64> {
        let mut total = 0;
        for day in &self.days {
            let (mut cal, mut pro) = (0, 0);
            for c in day {
                let table = &self.tables[c.table.0];
                let value = choices[c.choice.0];
                let serving = servings[c.serving.0];
                let meal_cal = table.calories[value] * serving;
                let meal_pro = table.protein[value] * serving;
                if !within_meal_cap(meal_cal, meal_pro) {
                    return None;
                }
                cal += meal_cal;
                pro += meal_pro;
            }
            total += self.objective.day_cost(cal, pro)?;
        }
        Some(total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Search completed; no better assignment exists.
    Optimal,
    /// An assignment was found but the time limit cut the search short.
    Feasible,
    /// No assignment satisfies the constraints.
    Infeasible,
    /// The time limit expired before any assignment was found.
    Unknown,
}

impl SolveStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub status: SolveStatus,
    pub choices: Vec<usize>,
    pub servings: Vec<i64>,
    pub objective: Option<i64>,
}

impl Solution {
    pub fn without_assignment(status: SolveStatus) -> Self {
        Self {
            status,
            choices: Vec::new(),
            servings: Vec::new(),
            objective: None,
        }
    }

    pub fn choice(&self, var: ChoiceVar) -> Option<usize> {
        self.choices.get(var.0).copied()
    }

    /// Servings in tenths.
    pub fn serving(&self, var: ServingVar) -> Option<i64> {
        self.servings.get(var.0).copied()
    }
}

/// A bounded-time optimizer for [`MealModel`].
pub trait Solver {
    fn solve(&self, model: &MealModel, time_limit: Duration) -> Solution;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nutrition_table_truncates() {
        let mut a = Recipe::new("A");
        a.calories = Some(550.57);
        a.protein_g = Some(40.09);
        let b = Recipe::new("B");
        let table = NutritionTable::from_recipes(&[&a, &b]);
        assert_eq!(table.calories, vec![5505, 0]);
        assert_eq!(table.protein, vec![400, 0]);
    }

    #[test]
    fn test_day_cost_and_cap() {
        let objective = DeviationObjective::daily(2000, 100, 10, 15);
        assert_eq!(objective.day_cost(200_000, 10_000), Some(0));
        assert_eq!(objective.day_cost(190_000, 11_000), Some(10 * 10_000 + 15 * 1_000));
        // more than twice the target away
        assert_eq!(objective.day_cost(700_000, 10_000), None);
    }

    #[test]
    fn test_fix_outside_domain_empties_it() {
        let mut model = MealModel::new(1, DeviationObjective::daily(2000, 100, 10, 15));
        let v = model.add_choice("x", 3);
        model.fix(v, 2);
        assert_eq!(model.choice_decl(v).domain, vec![2]);
        model.fix(v, 0);
        assert!(model.choice_decl(v).domain.is_empty());
    }

    #[test]
    fn test_is_feasible_checks_classes() {
        let mut model = MealModel::new(1, DeviationObjective::daily(2000, 100, 10, 15));
        let a = model.add_choice("a", 4);
        let b = model.add_choice("b", 4);
        model.all_different_by(vec![a, b], vec![0, 0, 1, 2]);
        model.at_least_one(vec![a, b], vec![0, 0, 1, 2], 2);
        assert!(model.is_feasible(&[0, 3]));
        // 0 and 1 share class 0
        assert!(!model.is_feasible(&[0, 1]));
        // nobody in class 2
        assert!(!model.is_feasible(&[0, 2]));
    }

    #[test]
    fn test_evaluate_sums_days() {
        let mut model = MealModel::new(2, DeviationObjective::daily(1000, 50, 10, 15));
        let mut r = Recipe::new("R");
        r.calories = Some(500.0);
        r.protein_g = Some(25.0);
        let t = model.add_table(NutritionTable::from_recipes(&[&r]));
        let c = model.add_choice("c", 1);
        let s = model.add_serving("s");
        model.contribute(0, c, t, s);
        model.contribute(1, c, t, s);
        // two servings hit both days exactly
        assert_eq!(model.evaluate(&[0], &[20]), Some(0));
        // one serving: each day 500 kcal / 25 g short
        assert_eq!(model.evaluate(&[0], &[10]), Some(2 * (10 * 50_000 + 15 * 2_500)));
    }
}
