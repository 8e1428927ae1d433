use crate::config::PlannerConfig;
use crate::models::{MealType, PrepStyle, Recipe};
use tracing::{debug, warn};

/// Hard filters shared by the planner and `suggest`. Every set filter must pass.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub meal_type: Option<MealType>,
    pub max_time: Option<u32>,
    pub cuisine: Option<String>,
    pub dietary_tags: Vec<String>,
    /// Recipe-name substrings.
    pub exclude: Vec<String>,
    pub excluded_cuisines: Vec<String>,
    pub excluded_ingredients: Vec<String>,
    pub min_protein: Option<f64>,
    pub max_calories: Option<f64>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(meal) = self.meal_type {
            if !recipe.matches_meal(meal) {
                return false;
            }
        }
        // Recipes without time data are never excluded by time.
        if let (Some(max), Some(total)) = (self.max_time, recipe.total_time_min) {
            if total > max {
                return false;
            }
        }
        if let Some(cuisine) = self.cuisine.as_deref().filter(|c| !c.is_empty()) {
            match recipe.cuisine.as_deref() {
                Some(rc) if contains_ci(rc, cuisine) => {}
                _ => return false,
            }
        }
        if !self.dietary_tags.is_empty() {
            let tags: Vec<String> = recipe.dietary_tags.iter().map(|t| t.to_lowercase()).collect();
            if !self
                .dietary_tags
                .iter()
                .all(|t| tags.contains(&t.trim().to_lowercase()))
            {
                return false;
            }
        }
        if self.exclude.iter().any(|ex| contains_ci(&recipe.name, ex)) {
            return false;
        }
        if let Some(rc) = recipe.cuisine.as_deref() {
            if self.excluded_cuisines.iter().any(|c| contains_ci(rc, c)) {
                return false;
            }
        }
        if !self.excluded_ingredients.is_empty() {
            let mut names = recipe.ingredient_names();
            if let Some(main) = recipe.main_ingredient.as_deref() {
                names.push(main.to_lowercase());
            }
            if self
                .excluded_ingredients
                .iter()
                .any(|ex| names.iter().any(|n| contains_ci(n, ex)))
            {
                return false;
            }
        }
        if let (Some(min), Some(protein)) = (self.min_protein, recipe.protein_g) {
            if protein < min {
                return false;
            }
        }
        if let (Some(max), Some(calories)) = (self.max_calories, recipe.calories) {
            if calories > max {
                return false;
            }
        }
        true
    }
}

/// Order-preserving subset of `recipes` that passes `filter`.
pub fn filter_recipes<'a>(recipes: &'a [Recipe], filter: &RecipeFilter) -> Vec<&'a Recipe> {
    recipes.iter().filter(|r| filter.matches(r)).collect()
}

/// Candidates for one meal type. Indices are stable: pins only ever append.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool<'a> {
    pub meal: MealType,
    recipes: Vec<&'a Recipe>,
}

impl<'a> CandidatePool<'a> {
    pub fn new(meal: MealType, recipes: Vec<&'a Recipe>) -> Self {
        Self { meal, recipes }
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Recipe> {
        self.recipes.get(index).copied()
    }

    pub fn recipes(&self) -> &[&'a Recipe] {
        &self.recipes
    }

    /// Appends a recipe, returning the extended pool and the recipe's index.
    pub fn with_recipe(mut self, recipe: &'a Recipe) -> (Self, usize) {
        self.recipes.push(recipe);
        let index = self.recipes.len() - 1;
        (self, index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolSet<'a> {
    pub breakfast: CandidatePool<'a>,
    pub lunch: CandidatePool<'a>,
    pub dinner: CandidatePool<'a>,
    pub snack: CandidatePool<'a>,
}

impl<'a> PoolSet<'a> {
    pub fn get(&self, meal: MealType) -> &CandidatePool<'a> {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
            MealType::Snack => &self.snack,
        }
    }

    /// Moves the pool for `meal` out, leaving an empty one in its place.
    pub fn take(&mut self, meal: MealType) -> CandidatePool<'a> {
        let slot = match meal {
            MealType::Breakfast => &mut self.breakfast,
            MealType::Lunch => &mut self.lunch,
            MealType::Dinner => &mut self.dinner,
            MealType::Snack => &mut self.snack,
        };
        std::mem::replace(slot, CandidatePool::new(meal, Vec::new()))
    }

    pub fn put(&mut self, pool: CandidatePool<'a>) {
        match pool.meal {
            MealType::Breakfast => self.breakfast = pool,
            MealType::Lunch => self.lunch = pool,
            MealType::Dinner => self.dinner = pool,
            MealType::Snack => self.snack = pool,
        }
    }
}

fn with_calories<'a>(recipes: Vec<&'a Recipe>) -> Vec<&'a Recipe> {
    recipes.into_iter().filter(|r| r.calories.is_some()).collect()
}

/// Builds the four per-meal pools from the corpus.
///
/// Candidates must carry calorie data. An empty breakfast, dinner or snack
/// pool falls back to every recipe with calories; an empty lunch pool copies
/// the dinner pool. The snack pool stays empty when snacks are disabled.
pub fn build_candidate_pools<'a>(
    recipes: &'a [Recipe],
    config: &PlannerConfig,
    exclude: &[String],
) -> PoolSet<'a> {
    let prefs = &config.preferences;
    let base = RecipeFilter {
        dietary_tags: prefs.dietary_tags.clone(),
        exclude: exclude.to_vec(),
        excluded_cuisines: prefs.cuisines_excluded.clone(),
        excluded_ingredients: prefs.ingredients_excluded.clone(),
        ..Default::default()
    };
    let meal_filter = |meal: MealType| {
        let max_time = match (meal, config.prep_styles.breakfast) {
            (MealType::Breakfast, PrepStyle::Batch) => prefs.max_batch_time_minutes,
            _ => prefs.max_prep_time_minutes,
        };
        RecipeFilter {
            meal_type: Some(meal),
            max_time,
            ..base.clone()
        }
    };
    let all_with_calories = || with_calories(recipes.iter().collect());
    let fallback = |meal: MealType, pool: Vec<&'a Recipe>| {
        if pool.is_empty() {
            warn!(meal = %meal, "No candidates found, using all recipes with calories");
            all_with_calories()
        } else {
            pool
        }
    };

    let breakfast = fallback(
        MealType::Breakfast,
        with_calories(filter_recipes(recipes, &meal_filter(MealType::Breakfast))),
    );
    let dinner = fallback(
        MealType::Dinner,
        with_calories(filter_recipes(recipes, &meal_filter(MealType::Dinner))),
    );
    let mut lunch = with_calories(filter_recipes(recipes, &meal_filter(MealType::Lunch)));
    if lunch.is_empty() {
        warn!("No lunch candidates found, sharing the dinner pool");
        lunch = dinner.clone();
    }
    let snack = if config.snacks_enabled() {
        fallback(
            MealType::Snack,
            with_calories(filter_recipes(recipes, &meal_filter(MealType::Snack))),
        )
    } else {
        Vec::new()
    };

    debug!(
        breakfast = breakfast.len(),
        lunch = lunch.len(),
        dinner = dinner.len(),
        snack = snack.len(),
        "Candidate pools built"
    );

    PoolSet {
        breakfast: CandidatePool::new(MealType::Breakfast, breakfast),
        lunch: CandidatePool::new(MealType::Lunch, lunch),
        dinner: CandidatePool::new(MealType::Dinner, dinner),
        snack: CandidatePool::new(MealType::Snack, snack),
    }
}
