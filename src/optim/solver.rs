//! Bounded-time search backend for [`MealModel`].
//!
//! Recipe choices are searched depth-first, day by day. For a fixed set of
//! choices the best servings are found exactly: serving variables used by a
//! single contribution are optimized per day, serving variables shared across
//! days (a batch breakfast) are enumerated jointly. Day costs are memoized.
//!
//! The search runs in three phases: a first-feasible descent, a local-search
//! improvement pass, then branch-and-bound from that incumbent until the
//! space is exhausted (optimal) or the deadline passes (feasible).

use super::model::{
    class_of, within_meal_cap, ChoiceVar, Constraint, MealModel, Solution, SolveStatus, Solver,
};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

const INFEASIBLE: i64 = i64::MAX;
const MEMO_LIMIT: usize = 500_000;
const DEFAULT_SERVING: i64 = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchSolver;

impl Solver for SearchSolver {
    fn solve(&self, model: &MealModel, time_limit: Duration) -> Solution {
        // A limit too large to represent is no limit.
        let deadline = Instant::now().checked_add(time_limit);
        Search::new(model, deadline).run()
    }
}

#[derive(Debug, Clone, Copy)]
enum ServingSlot {
    /// Index into the shared serving variables.
    Shared(usize),
    /// A serving variable used by this contribution only.
    Local(usize),
}

#[derive(Debug, Clone, Copy)]
struct Term {
    choice: usize,
    table: usize,
    slot: ServingSlot,
}

#[derive(Debug, Clone, Default)]
struct DayShape {
    terms: Vec<Term>,
    vars: Vec<usize>,
}

fn add_costs(acc: &mut [i64], costs: &[i64]) {
    for (a, c) in acc.iter_mut().zip(costs) {
        *a = a.saturating_add(*c);
    }
}

/// Exact serving optimization for fixed recipe choices.
struct Evaluator<'m> {
    model: &'m MealModel,
    days: Vec<DayShape>,
    shared_vars: Vec<usize>,
    shared_combos: Vec<Vec<i64>>,
    memo: HashMap<(usize, Vec<usize>), Vec<i64>>,
}

impl<'m> Evaluator<'m> {
    fn new(model: &'m MealModel) -> Self {
        let mut uses = vec![0usize; model.servings.len()];
        for day in &model.days {
            for c in day {
                uses[c.serving.0] += 1;
            }
        }
        let shared_vars: Vec<usize> = (0..uses.len()).filter(|s| uses[*s] > 1).collect();
        let shared_pos: HashMap<usize, usize> = shared_vars
            .iter()
            .enumerate()
            .map(|(pos, s)| (*s, pos))
            .collect();

        let mut shared_combos: Vec<Vec<i64>> = vec![Vec::new()];
        for s in &shared_vars {
            shared_combos = shared_combos
                .iter()
                .flat_map(|combo| {
                    model.servings[*s].options.iter().map(move |o| {
                        let mut next = combo.clone();
                        next.push(*o);
                        next
                    })
                })
                .collect();
        }

        let days = model
            .days
            .iter()
            .map(|contributions| {
                let terms: Vec<Term> = contributions
                    .iter()
                    .map(|c| Term {
                        choice: c.choice.0,
                        table: c.table.0,
                        slot: match shared_pos.get(&c.serving.0) {
                            Some(pos) => ServingSlot::Shared(*pos),
                            None => ServingSlot::Local(c.serving.0),
                        },
                    })
                    .collect();
                let mut vars: Vec<usize> = terms.iter().map(|t| t.choice).collect();
                vars.sort_unstable();
                vars.dedup();
                DayShape { terms, vars }
            })
            .collect();

        Self {
            model,
            days,
            shared_vars,
            shared_combos,
            memo: HashMap::new(),
        }
    }

    fn combos(&self) -> usize {
        self.shared_combos.len()
    }

    fn day_values(&self, day: usize, assignment: &[usize]) -> Vec<usize> {
        self.days[day]
            .terms
            .iter()
            .map(|t| assignment[t.choice])
            .collect()
    }

    /// Adds the per-combo cost of `day` under `assignment` into `acc`.
    fn add_day(&mut self, day: usize, assignment: &[usize], acc: &mut [i64]) {
        let key = (day, self.day_values(day, assignment));
        if let Some(costs) = self.memo.get(&key) {
            add_costs(acc, costs);
            return;
        }
        let costs = self.compute_day(day, &key.1);
        add_costs(acc, &costs);
        if self.memo.len() >= MEMO_LIMIT {
            self.memo.clear();
        }
        self.memo.insert(key, costs);
    }

    fn compute_day(&self, day: usize, values: &[usize]) -> Vec<i64> {
        let model = self.model;
        let objective = model.objective;
        let mut local_sums: Vec<(i64, i64)> = vec![(0, 0)];
        let mut shared_terms: Vec<(i64, i64, usize)> = Vec::new();

        for (term, &value) in self.days[day].terms.iter().zip(values) {
            let table = &model.tables[term.table];
            let (cal, pro) = (table.calories[value], table.protein[value]);
            match term.slot {
                ServingSlot::Shared(pos) => shared_terms.push((cal, pro, pos)),
                ServingSlot::Local(s) => {
                    let options: Vec<(i64, i64)> = model.servings[s]
                        .options
                        .iter()
                        .map(|o| (cal * o, pro * o))
                        .filter(|(c, p)| within_meal_cap(*c, *p))
                        .collect();
                    if options.is_empty() {
                        return vec![INFEASIBLE; self.combos()];
                    }
                    let mut next: Vec<(i64, i64)> = local_sums
                        .iter()
                        .flat_map(|&(a, b)| options.iter().map(move |&(c, p)| (a + c, b + p)))
                        .collect();
                    next.sort_unstable();
                    next.dedup();
                    local_sums = next;
                }
            }
        }

        self.shared_combos
            .iter()
            .map(|combo| {
                let (mut cal, mut pro) = (0, 0);
                for &(c, p, pos) in &shared_terms {
                    let (meal_cal, meal_pro) = (c * combo[pos], p * combo[pos]);
                    if !within_meal_cap(meal_cal, meal_pro) {
                        return INFEASIBLE;
                    }
                    cal += meal_cal;
                    pro += meal_pro;
                }
                local_sums
                    .iter()
                    .filter_map(|&(lc, lp)| objective.day_cost(cal + lc, pro + lp))
                    .min()
                    .unwrap_or(INFEASIBLE)
            })
            .collect()
    }

    /// Objective of a complete assignment, `INFEASIBLE` if no servings fit.
    fn total(&mut self, assignment: &[usize]) -> i64 {
        let mut acc = vec![0; self.combos()];
        for day in 0..self.days.len() {
            self.add_day(day, assignment, &mut acc);
        }
        acc.into_iter().min().unwrap_or(INFEASIBLE)
    }

    /// Serving values (tenths) that realize the optimum for `assignment`.
    fn best_servings(&mut self, assignment: &[usize]) -> Vec<i64> {
        let model = self.model;
        let mut servings = vec![DEFAULT_SERVING; model.servings.len()];

        let mut acc = vec![0; self.combos()];
        for day in 0..self.days.len() {
            self.add_day(day, assignment, &mut acc);
        }
        let best_combo = acc
            .iter()
            .enumerate()
            .min_by_key(|(_, cost)| **cost)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let combo = self.shared_combos[best_combo].clone();
        for (pos, s) in self.shared_vars.iter().enumerate() {
            servings[*s] = combo[pos];
        }

        for shape in &self.days {
            let (mut cal, mut pro) = (0, 0);
            let mut locals: Vec<(usize, i64, i64)> = Vec::new();
            for term in &shape.terms {
                let table = &model.tables[term.table];
                let value = assignment[term.choice];
                let (c, p) = (table.calories[value], table.protein[value]);
                match term.slot {
                    ServingSlot::Shared(pos) => {
                        cal += c * combo[pos];
                        pro += p * combo[pos];
                    }
                    ServingSlot::Local(s) => locals.push((s, c, p)),
                }
            }

            // mixed-radix walk over every local serving combination
            let radix: Vec<usize> = locals
                .iter()
                .map(|(s, _, _)| model.servings[*s].options.len())
                .collect();
            let total: usize = radix.iter().product();
            let mut best: Option<(i64, usize)> = None;
            for code in 0..total {
                let mut rest = code;
                let (mut day_cal, mut day_pro) = (cal, pro);
                let mut fits = true;
                for (i, (s, c, p)) in locals.iter().enumerate() {
                    let option = model.servings[*s].options[rest % radix[i]];
                    rest /= radix[i];
                    if !within_meal_cap(c * option, p * option) {
                        fits = false;
                        break;
                    }
                    day_cal += c * option;
                    day_pro += p * option;
                }
                if !fits {
                    continue;
                }
                if let Some(cost) = model.objective.day_cost(day_cal, day_pro) {
                    if best.map_or(true, |(b, _)| cost < b) {
                        best = Some((cost, code));
                    }
                }
            }
            if let Some((_, code)) = best {
                let mut rest = code;
                for (i, (s, _, _)) in locals.iter().enumerate() {
                    servings[*s] = model.servings[*s].options[rest % radix[i]];
                    rest /= radix[i];
                }
            }
        }
        servings
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    FirstFeasible,
    Improve,
}

struct Search<'m> {
    model: &'m MealModel,
    eval: Evaluator<'m>,
    deadline: Option<Instant>,
    nodes: u64,
    timed_out: bool,
    order: Vec<usize>,
    values: Vec<Vec<usize>>,
    assignment: Vec<usize>,
    assigned: Vec<bool>,
    var_days: Vec<Vec<usize>>,
    day_open: Vec<usize>,
    var_constraints: Vec<Vec<usize>>,
    used: Vec<HashMap<usize, usize>>,
    base_costs: Vec<i64>,
    best: Option<(i64, Vec<usize>)>,
}

impl<'m> Search<'m> {
    fn new(model: &'m MealModel, deadline: Option<Instant>) -> Self {
        let mut eval = Evaluator::new(model);
        let n = model.choices.len();

        let mut var_days = vec![Vec::new(); n];
        let mut day_open = vec![0; eval.days.len()];
        for (d, shape) in eval.days.iter().enumerate() {
            for v in &shape.vars {
                var_days[*v].push(d);
            }
            day_open[d] = shape.vars.len();
        }

        let mut var_constraints = vec![Vec::new(); n];
        for (ci, c) in model.constraints.iter().enumerate() {
            let mut seen = HashSet::new();
            for v in c.vars() {
                if seen.insert(v.0) {
                    var_constraints[v.0].push(ci);
                }
            }
        }

        // Day-major: fixed variables first, then by the earliest day they feed.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|v| {
            let first_day = var_days[*v].first().copied().unwrap_or(usize::MAX);
            (model.choices[*v].domain.len() > 1, first_day, *v)
        });

        let values = (0..n).map(|v| ordered_values(model, ChoiceVar(v))).collect();

        // Days with no choices cost the same whatever is chosen.
        let mut base_costs = vec![0; eval.combos()];
        for d in 0..eval.days.len() {
            if day_open[d] == 0 {
                eval.add_day(d, &[], &mut base_costs);
            }
        }

        Self {
            model,
            eval,
            deadline,
            nodes: 0,
            timed_out: false,
            order,
            values,
            assignment: vec![0; n],
            assigned: vec![false; n],
            var_days,
            day_open,
            var_constraints,
            used: vec![HashMap::new(); model.constraints.len()],
            base_costs,
            best: None,
        }
    }

    fn run(mut self) -> Solution {
        if self.model.choices.iter().any(|c| c.domain.is_empty()) || !self.root_feasible() {
            debug!("Model infeasible before search");
            return Solution::without_assignment(SolveStatus::Infeasible);
        }

        let base = self.base_costs.clone();
        self.dfs(0, &base, Mode::FirstFeasible);
        let Some((first_cost, first)) = self.best.clone() else {
            let status = if self.timed_out {
                SolveStatus::Unknown
            } else {
                SolveStatus::Infeasible
            };
            debug!(nodes = self.nodes, ?status, "No feasible assignment");
            return Solution::without_assignment(status);
        };
        debug!(objective = first_cost, nodes = self.nodes, "First feasible assignment");

        if !self.timed_out {
            let (improved, cost) = self.local_search(first, first_cost);
            self.best = Some((cost, improved));
            debug!(objective = cost, "After local search");
        }
        if !self.timed_out {
            self.dfs(0, &base, Mode::Improve);
        }

        let status = if self.timed_out {
            SolveStatus::Feasible
        } else {
            SolveStatus::Optimal
        };
        let Some((objective, choices)) = self.best.clone() else {
            return Solution::without_assignment(SolveStatus::Unknown);
        };
        let servings = self.eval.best_servings(&choices);
        debug!(objective, nodes = self.nodes, ?status, "Search finished");
        Solution {
            status,
            choices,
            servings,
            objective: Some(objective),
        }
    }

    /// Reads the clock on every call. A single node can evaluate thousands
    /// of serving combinations, so sampling would overshoot the limit.
    fn expired(&mut self) -> bool {
        if !self.timed_out && self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.timed_out = true;
        }
        self.timed_out
    }

    fn past_deadline(&mut self) -> bool {
        self.nodes += 1;
        self.expired()
    }

    /// Pigeonhole and coverage checks on the unrestricted domains.
    fn root_feasible(&self) -> bool {
        self.model.constraints.iter().all(|c| match c {
            Constraint::AllDifferent { vars, classes } => {
                let distinct: HashSet<usize> = vars
                    .iter()
                    .flat_map(|v| self.model.choices[v.0].domain.iter())
                    .map(|value| class_of(classes.as_ref(), *value))
                    .collect();
                let unique_vars: HashSet<usize> = vars.iter().map(|v| v.0).collect();
                distinct.len() >= unique_vars.len()
            }
            Constraint::AtLeastOne { vars, classes, class } => vars.iter().any(|v| {
                self.model.choices[v.0]
                    .domain
                    .iter()
                    .any(|value| class_of(Some(classes), *value) == *class)
            }),
        })
    }

    fn classes_of(&self, ci: usize) -> Option<&Vec<usize>> {
        match &self.model.constraints[ci] {
            Constraint::AllDifferent { classes, .. } => classes.as_ref(),
            Constraint::AtLeastOne { classes, .. } => Some(classes),
        }
    }

    fn consistent(&self, var: usize, value: usize) -> bool {
        self.var_constraints[var].iter().all(|&ci| {
            match &self.model.constraints[ci] {
                Constraint::AllDifferent { classes, .. } => {
                    let class = class_of(classes.as_ref(), value);
                    self.used[ci].get(&class).copied().unwrap_or(0) == 0
                }
                Constraint::AtLeastOne { .. } => true,
            }
        })
    }

    fn assign(&mut self, var: usize, value: usize) {
        let model = self.model;
        self.assignment[var] = value;
        self.assigned[var] = true;
        for i in 0..self.var_constraints[var].len() {
            let ci = self.var_constraints[var][i];
            if let Constraint::AllDifferent { classes, .. } = &model.constraints[ci] {
                let class = class_of(classes.as_ref(), value);
                *self.used[ci].entry(class).or_insert(0) += 1;
            }
        }
        for &d in &self.var_days[var] {
            self.day_open[d] -= 1;
        }
    }

    fn unassign(&mut self, var: usize) {
        let model = self.model;
        let value = self.assignment[var];
        self.assigned[var] = false;
        for i in 0..self.var_constraints[var].len() {
            let ci = self.var_constraints[var][i];
            if let Constraint::AllDifferent { classes, .. } = &model.constraints[ci] {
                let class = class_of(classes.as_ref(), value);
                if let Some(count) = self.used[ci].get_mut(&class) {
                    *count -= 1;
                    if *count == 0 {
                        self.used[ci].remove(&class);
                    }
                }
            }
        }
        for &d in &self.var_days[var] {
            self.day_open[d] += 1;
        }
    }

    /// Can every constraint touching `var` still be satisfied?
    fn forward_ok(&self, var: usize) -> bool {
        self.var_constraints[var].iter().all(|&ci| {
            let constraint = &self.model.constraints[ci];
            let classes = self.classes_of(ci);
            let mut open: Vec<usize> = constraint
                .vars()
                .iter()
                .map(|v| v.0)
                .filter(|v| !self.assigned[*v])
                .collect();
            open.sort_unstable();
            open.dedup();
            match constraint {
                Constraint::AllDifferent { .. } => {
                    let mut available = HashSet::new();
                    for v in &open {
                        let mut any = false;
                        for value in &self.model.choices[*v].domain {
                            let class = class_of(classes, *value);
                            if !self.used[ci].contains_key(&class) {
                                available.insert(class);
                                any = true;
                            }
                        }
                        if !any {
                            return false;
                        }
                    }
                    available.len() >= open.len()
                }
                Constraint::AtLeastOne { vars, class, .. } => {
                    let hit = vars.iter().any(|v| {
                        self.assigned[v.0]
                            && class_of(classes, self.assignment[v.0]) == *class
                    });
                    hit || open.iter().any(|v| {
                        self.model.choices[*v]
                            .domain
                            .iter()
                            .any(|value| class_of(classes, *value) == *class)
                    })
                }
            }
        })
    }

    /// Returns true when the search must stop.
    fn dfs(&mut self, depth: usize, acc: &[i64], mode: Mode) -> bool {
        if depth == self.order.len() {
            let cost = acc.iter().copied().min().unwrap_or(INFEASIBLE);
            if cost == INFEASIBLE {
                return false;
            }
            if self.best.as_ref().map_or(true, |(b, _)| cost < *b) {
                self.best = Some((cost, self.assignment.clone()));
            }
            return mode == Mode::FirstFeasible;
        }
        if self.past_deadline() {
            return true;
        }

        let var = self.order[depth];
        for i in 0..self.values[var].len() {
            if self.expired() {
                return true;
            }
            let value = self.values[var][i];
            if !self.consistent(var, value) {
                continue;
            }
            self.assign(var, value);

            let mut stop = false;
            if self.forward_ok(var) {
                let mut next = acc.to_vec();
                for k in 0..self.var_days[var].len() {
                    let d = self.var_days[var][k];
                    if self.day_open[d] == 0 {
                        self.eval.add_day(d, &self.assignment, &mut next);
                    }
                }
                let bound = next.iter().copied().min().unwrap_or(INFEASIBLE);
                let promising = bound != INFEASIBLE
                    && match (mode, &self.best) {
                        (Mode::Improve, Some((best, _))) => bound < *best,
                        _ => true,
                    };
                if promising {
                    stop = self.dfs(depth + 1, &next, mode);
                }
            }

            self.unassign(var);
            if stop {
                return true;
            }
        }
        false
    }

    /// Single-variable moves and pairwise swaps until no move improves.
    fn local_search(&mut self, mut current: Vec<usize>, mut cost: i64) -> (Vec<usize>, i64) {
        let n = current.len();
        loop {
            let mut improved = false;

            for var in 0..n {
                if self.expired() {
                    return (current, cost);
                }
                let original = current[var];
                let mut best_move = (cost, original);
                for i in 0..self.values[var].len() {
                    if self.expired() {
                        break;
                    }
                    let value = self.values[var][i];
                    if value == original {
                        continue;
                    }
                    current[var] = value;
                    if self.model.is_feasible(&current) {
                        let candidate = self.eval.total(&current);
                        if candidate < best_move.0 {
                            best_move = (candidate, value);
                        }
                    }
                }
                current[var] = best_move.1;
                if best_move.0 < cost {
                    cost = best_move.0;
                    improved = true;
                }
            }

            for a in 0..n {
                if self.expired() {
                    return (current, cost);
                }
                for b in (a + 1)..n {
                    if self.expired() {
                        return (current, cost);
                    }
                    let (va, vb) = (current[a], current[b]);
                    if va == vb
                        || !self.model.choices[a].domain.contains(&vb)
                        || !self.model.choices[b].domain.contains(&va)
                    {
                        continue;
                    }
                    current.swap(a, b);
                    let candidate = if self.model.is_feasible(&current) {
                        self.eval.total(&current)
                    } else {
                        INFEASIBLE
                    };
                    if candidate < cost {
                        cost = candidate;
                        improved = true;
                    } else {
                        current.swap(a, b);
                    }
                }
            }

            if !improved {
                return (current, cost);
            }
        }
    }
}

/// Domain values ordered by how close one sensible portion lands to the
/// variable's hint (or an even share of the first day it feeds).
fn ordered_values(model: &MealModel, var: ChoiceVar) -> Vec<usize> {
    let decl = &model.choices[var.0];
    let mut values = decl.domain.clone();
    if values.len() <= 1 {
        return values;
    }
    let Some((day, contribution)) = model.days.iter().enumerate().find_map(|(d, cs)| {
        cs.iter().find(|c| c.choice == var).map(|c| (d, *c))
    }) else {
        return values;
    };
    let objective = model.objective;
    let (hint_cal, hint_pro) = decl.hint.unwrap_or_else(|| {
        let share = model.days[day].len().max(1) as i64;
        (objective.calorie_target / share, objective.protein_target / share)
    });
    let table = &model.tables[contribution.table.0];
    let options = &model.servings[contribution.serving.0].options;

    values.sort_by_key(|value| {
        let (cal, pro) = (table.calories[*value], table.protein[*value]);
        options
            .iter()
            .map(|o| {
                objective.calorie_weight * (cal * o - hint_cal).abs()
                    + objective.protein_weight * (pro * o - hint_pro).abs()
            })
            .min()
            .unwrap_or(i64::MAX)
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipe;
    use crate::optim::model::{DeviationObjective, NutritionTable, SERVING_OPTIONS};

    fn recipes(rows: &[(&str, f64, f64)]) -> Vec<Recipe> {
        rows.iter()
            .map(|(name, cal, pro)| {
                let mut r = Recipe::new(*name);
                r.calories = Some(*cal);
                r.protein_g = Some(*pro);
                r
            })
            .collect()
    }

    fn table(recipes: &[Recipe]) -> NutritionTable {
        let refs: Vec<&Recipe> = recipes.iter().collect();
        NutritionTable::from_recipes(&refs)
    }

    /// Every assignment of choices and servings, for cross-checking.
    fn brute_force(model: &MealModel) -> Option<i64> {
        let domains: Vec<Vec<usize>> = model.choices.iter().map(|c| c.domain.clone()).collect();
        let mut best = None;
        let mut choices = vec![0; domains.len()];
        let choice_total: usize = domains.iter().map(|d| d.len()).product();
        let serving_total = 8usize.pow(model.servings.len() as u32);
        for code in 0..choice_total {
            let mut rest = code;
            for (i, d) in domains.iter().enumerate() {
                choices[i] = d[rest % d.len()];
                rest /= d.len();
            }
            if !model.is_feasible(&choices) {
                continue;
            }
            for s_code in 0..serving_total {
                let mut rest = s_code;
                let servings: Vec<i64> = (0..model.servings.len())
                    .map(|_| {
                        let o = SERVING_OPTIONS[rest % 8];
                        rest /= 8;
                        o
                    })
                    .collect();
                if let Some(cost) = model.evaluate(&choices, &servings) {
                    if best.map_or(true, |b| cost < b) {
                        best = Some(cost);
                    }
                }
            }
        }
        best
    }

    #[test]
    fn test_matches_brute_force_with_shared_serving() {
        let breakfasts = recipes(&[("Oats", 350.0, 12.0), ("Eggs", 300.0, 25.0)]);
        let dinners = recipes(&[
            ("Stew", 480.0, 35.0),
            ("Curry", 550.0, 40.0),
            ("Noodles", 500.0, 25.0),
        ]);
        let mut model = MealModel::new(2, DeviationObjective::daily(1600, 100, 10, 15));
        let bt = model.add_table(table(&breakfasts));
        let dt = model.add_table(table(&dinners));
        let bf = model.add_choice("bf", 2);
        let bf_s = model.add_serving("bf_s");
        let d0 = model.add_choice("d0", 3);
        let d1 = model.add_choice("d1", 3);
        let d0_s = model.add_serving("d0_s");
        let d1_s = model.add_serving("d1_s");
        model.contribute(0, bf, bt, bf_s);
        model.contribute(1, bf, bt, bf_s);
        model.contribute(0, d0, dt, d0_s);
        model.contribute(1, d1, dt, d1_s);
        model.all_different(vec![d0, d1]);

        let solution = SearchSolver.solve(&model, Duration::from_secs(10));
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, brute_force(&model));
        assert_ne!(solution.choice(d0), solution.choice(d1));
        // reported servings realize the reported objective
        assert_eq!(
            model.evaluate(&solution.choices, &solution.servings),
            solution.objective
        );
    }

    #[test]
    fn test_infeasible_all_different() {
        let dinners = recipes(&[("Stew", 480.0, 35.0), ("Curry", 550.0, 40.0)]);
        let mut model = MealModel::new(3, DeviationObjective::daily(2000, 100, 10, 15));
        let dt = model.add_table(table(&dinners));
        let vars: Vec<ChoiceVar> = (0..3)
            .map(|d| {
                let v = model.add_choice(format!("d{}", d), 2);
                let s = model.add_serving(format!("s{}", d));
                model.contribute(d, v, dt, s);
                v
            })
            .collect();
        model.all_different(vars);
        let solution = SearchSolver.solve(&model, Duration::from_secs(5));
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(solution.choices.is_empty());
    }

    #[test]
    fn test_fixed_value_and_group_coverage() {
        let dinners = recipes(&[
            ("Chicken A", 500.0, 40.0),
            ("Chicken B", 520.0, 42.0),
            ("Beef", 600.0, 45.0),
            ("Tofu", 400.0, 20.0),
        ]);
        let groups = vec![0, 0, 1, 2];
        let mut model = MealModel::new(2, DeviationObjective::daily(500, 40, 10, 15));
        let dt = model.add_table(table(&dinners));
        let d0 = model.add_choice("d0", 4);
        let d1 = model.add_choice("d1", 4);
        for (day, var) in [(0, d0), (1, d1)] {
            let s = model.add_serving(format!("s{}", day));
            model.contribute(day, var, dt, s);
        }
        model.fix(d0, 0);
        model.all_different_by(vec![d1], groups.clone());
        model.at_least_one(vec![d1], groups, 2);

        let solution = SearchSolver.solve(&model, Duration::from_secs(5));
        assert!(solution.status.has_solution());
        assert_eq!(solution.choice(d0), Some(0));
        assert_eq!(solution.choice(d1), Some(3));
    }

    #[test]
    fn test_meal_cap_rules_out_oversized_recipe() {
        let dinners = recipes(&[("Feast", 2500.0, 80.0)]);
        let mut model = MealModel::new(1, DeviationObjective::daily(2000, 100, 10, 15));
        let dt = model.add_table(table(&dinners));
        let v = model.add_choice("d", 1);
        let s = model.add_serving("s");
        model.contribute(0, v, dt, s);
        let solution = SearchSolver.solve(&model, Duration::from_secs(5));
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }
    /// Seven days of four fresh meals drawn from 80 candidates each.
    fn large_week() -> MealModel {
        let candidates: Vec<Recipe> = (0..80)
            .map(|i| {
                let mut r = Recipe::new(format!("Recipe {}", i));
                r.calories = Some(250.0 + (i * 37 % 500) as f64);
                r.protein_g = Some(8.0 + (i * 13 % 45) as f64);
                r
            })
            .collect();
        let mut model = MealModel::new(7, DeviationObjective::daily(2200, 150, 10, 15));
        let t = model.add_table(table(&candidates));
        for meal in 0..4 {
            let vars: Vec<ChoiceVar> = (0..7)
                .map(|day| {
                    let v = model.add_choice(format!("m{}_d{}", meal, day), candidates.len());
                    let s = model.add_serving(format!("m{}_s{}", meal, day));
                    model.contribute(day, v, t, s);
                    v
                })
                .collect();
            model.all_different(vars);
        }
        model
    }

    #[test]
    fn test_short_time_limit_is_respected() {
        let model = large_week();
        let limit = Duration::from_millis(300);
        let started = Instant::now();
        let solution = SearchSolver.solve(&model, limit);
        let elapsed = started.elapsed();
        assert!(
            elapsed < limit + Duration::from_secs(1),
            "search ran {:?} on a {:?} limit",
            elapsed,
            limit
        );
        assert!(matches!(
            solution.status,
            SolveStatus::Feasible | SolveStatus::Unknown | SolveStatus::Optimal
        ));
    }

    #[test]
    fn test_unrepresentable_time_limit_does_not_panic() {
        let dinners = recipes(&[("Stew", 480.0, 35.0), ("Curry", 550.0, 40.0)]);
        let mut model = MealModel::new(1, DeviationObjective::daily(500, 40, 10, 15));
        let dt = model.add_table(table(&dinners));
        let v = model.add_choice("d", 2);
        let s = model.add_serving("s");
        model.contribute(0, v, dt, s);
        let solution = SearchSolver.solve(&model, Duration::MAX);
        assert_eq!(solution.status, SolveStatus::Optimal);
    }
}
