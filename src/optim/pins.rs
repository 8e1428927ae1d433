use super::pools::{CandidatePool, PoolSet};
use crate::error::PlanError;
use crate::models::{day_name, weekday_index, MealType, Recipe};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Which plan days a pin applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPattern {
    /// A weekday, Monday = 0.
    Single(usize),
    All,
    Even,
    Odd,
}

impl DayPattern {
    /// Concrete day indices within a plan of `num_days` days.
    pub fn expand(&self, num_days: usize) -> Vec<usize> {
        match self {
            DayPattern::Single(day) if *day < num_days => vec![*day],
            DayPattern::Single(_) => Vec::new(),
            DayPattern::All => (0..num_days).collect(),
            DayPattern::Even => (0..num_days).filter(|d| d % 2 == 0).collect(),
            DayPattern::Odd => (0..num_days).filter(|d| d % 2 == 1).collect(),
        }
    }
}

impl fmt::Display for DayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayPattern::Single(day) => f.write_str(&day_name(*day).to_lowercase()),
            DayPattern::All => f.write_str("all"),
            DayPattern::Even => f.write_str("even"),
            DayPattern::Odd => f.write_str("odd"),
        }
    }
}

/// A user request to force a recipe into slots: `day:meal:Recipe Name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSpec {
    pub pattern: DayPattern,
    pub meal_type: MealType,
    pub recipe_query: String,
}

impl FromStr for PinSpec {
    type Err = PlanError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_pin(raw)
    }
}

/// Parses `day:meal:Recipe Name`. The recipe part may itself contain colons.
pub fn parse_pin(raw: &str) -> Result<PinSpec, PlanError> {
    let parts: Vec<&str> = raw.splitn(3, ':').collect();
    let [day, meal, recipe] = parts.as_slice() else {
        return Err(PlanError::InvalidPinFormat(raw.to_string()));
    };
    let day = day.trim().to_lowercase();
    let meal = meal.trim().to_lowercase();
    let recipe = recipe.trim();

    if recipe.is_empty() {
        return Err(PlanError::EmptyRecipeName(raw.to_string()));
    }

    let pattern = match day.as_str() {
        "all" => DayPattern::All,
        "even" => DayPattern::Even,
        "odd" => DayPattern::Odd,
        other => match weekday_index(other) {
            Some(index) => DayPattern::Single(index),
            None => return Err(PlanError::UnknownDay(day.clone())),
        },
    };
    let meal_type = MealType::parse(&meal).ok_or(PlanError::UnknownMealType(meal))?;

    Ok(PinSpec {
        pattern,
        meal_type,
        recipe_query: recipe.to_string(),
    })
}

/// A pin bound to a concrete recipe and its index in the meal's pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPin<'a> {
    pub days: Vec<usize>,
    pub meal_type: MealType,
    pub recipe: &'a Recipe,
    pub candidate_index: usize,
    pub injected: bool,
}

/// Result of looking a query up in a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLookup<'a> {
    pub recipe: &'a Recipe,
    pub index: usize,
    pub injected: bool,
}

fn shortest_containing<'a, I>(query: &str, recipes: I) -> Option<(usize, &'a Recipe)>
where
    I: Iterator<Item = &'a Recipe>,
{
    recipes
        .enumerate()
        .filter(|(_, r)| r.name.to_lowercase().contains(query))
        .min_by_key(|(_, r)| r.name.chars().count())
}

/// Finds a recipe by name, in order: exact in the pool, shortest substring
/// match in the pool, exact in the corpus, shortest substring match in the
/// corpus. Corpus hits are appended to the pool.
pub fn find_recipe<'a>(
    query: &str,
    pool: CandidatePool<'a>,
    corpus: &'a [Recipe],
) -> Result<(CandidatePool<'a>, RecipeLookup<'a>), PlanError> {
    let q = query.to_lowercase();

    let in_pool = pool
        .recipes()
        .iter()
        .position(|r| r.name.to_lowercase() == q)
        .or_else(|| shortest_containing(&q, pool.recipes().iter().copied()).map(|(i, _)| i));
    if let Some(index) = in_pool {
        if let Some(recipe) = pool.get(index) {
            let lookup = RecipeLookup {
                recipe,
                index,
                injected: false,
            };
            return Ok((pool, lookup));
        }
    }

    let from_corpus = corpus
        .iter()
        .find(|r| r.name.to_lowercase() == q)
        .or_else(|| shortest_containing(&q, corpus.iter()).map(|(_, r)| r));
    match from_corpus {
        Some(recipe) => {
            debug!(recipe = %recipe.name, meal = %pool.meal, "Injecting pinned recipe into pool");
            let (pool, index) = pool.with_recipe(recipe);
            let lookup = RecipeLookup {
                recipe,
                index,
                injected: true,
            };
            Ok((pool, lookup))
        }
        None => Err(PlanError::RecipeNotFound(query.to_string())),
    }
}

/// Resolves every pin against the pools, injecting corpus recipes as needed,
/// then rejects any (day, meal) slot claimed by two different recipes.
///
/// # Returns
/// The extended pools and one `ResolvedPin` per input pin, in input order.
pub fn resolve_pins<'a>(
    pins: &[PinSpec],
    mut pools: PoolSet<'a>,
    corpus: &'a [Recipe],
    num_days: usize,
    batch_breakfast: bool,
) -> Result<(PoolSet<'a>, Vec<ResolvedPin<'a>>), PlanError> {
    let mut resolved = Vec::with_capacity(pins.len());

    for pin in pins {
        if pin.meal_type == MealType::Breakfast && batch_breakfast && pin.pattern != DayPattern::All {
            return Err(PlanError::BatchBreakfastPattern {
                pattern: pin.pattern.to_string(),
                query: pin.recipe_query.clone(),
            });
        }

        let pool = pools.take(pin.meal_type);
        let (pool, lookup) = find_recipe(&pin.recipe_query, pool, corpus)?;
        pools.put(pool);

        if lookup.recipe.calories.is_none() {
            warn!(
                recipe = %lookup.recipe.name,
                "Pinned recipe has no calorie data; nutrition optimization will be inaccurate"
            );
        }

        resolved.push(ResolvedPin {
            days: pin.pattern.expand(num_days),
            meal_type: pin.meal_type,
            recipe: lookup.recipe,
            candidate_index: lookup.index,
            injected: lookup.injected,
        });
    }

    let mut claimed: HashMap<(usize, MealType), &str> = HashMap::new();
    for pin in &resolved {
        for &day in &pin.days {
            let name = pin.recipe.name.as_str();
            if let Some(existing) = claimed.insert((day, pin.meal_type), name) {
                if existing != name {
                    return Err(PlanError::PinConflict {
                        day: day_name(day),
                        meal: pin.meal_type,
                        first: existing.to_string(),
                        second: name.to_string(),
                    });
                }
            }
        }
    }

    Ok((pools, resolved))
}
