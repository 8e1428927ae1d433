use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Weekday names indexed Monday = 0.
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Display name for a plan day. Days beyond the first week are numbered.
pub fn day_name(day: usize) -> String {
    if day < DAY_NAMES.len() {
        DAY_NAMES[day].to_string()
    } else {
        format!("day {}", day)
    }
}

/// Lower-case weekday name to its Monday-based index.
pub fn weekday_index(name: &str) -> Option<usize> {
    let name = name.trim().to_lowercase();
    DAY_NAMES
        .iter()
        .position(|d| d.to_lowercase() == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            "snack" => Some(MealType::Snack),
            _ => None,
        }
    }

    /// Recipe meal_type/category labels accepted for this meal.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            MealType::Breakfast => &["breakfast"],
            MealType::Lunch => &["lunch", "main course", "soup"],
            MealType::Dinner => &["dinner", "main course", "soup", "curry"],
            MealType::Snack => &["snack", "appetizer", "dessert", "side", "side dish"],
        }
    }

    /// Capitalised label for tables.
    pub fn title(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepStyle {
    Batch,
    Fresh,
    Leftover,
}

impl PrepStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrepStyle::Batch => "batch",
            PrepStyle::Fresh => "fresh",
            PrepStyle::Leftover => "leftover",
        }
    }
}

impl fmt::Display for PrepStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub item: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSection {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub items: Vec<ParsedIngredient>,
}

/// A recipe from the corpus. Nutrition values are per serving.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub file_path: PathBuf,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub servings: Option<u32>,
    pub prep_time_min: Option<u32>,
    pub cook_time_min: Option<u32>,
    pub total_time_min: Option<u32>,
    pub meal_type: Option<String>,
    pub cuisine: Option<String>,
    pub main_ingredient: Option<String>,
    pub cooking_method: Option<String>,
    pub dietary_tags: Vec<String>,
    pub categories: Vec<String>,
    pub rating: Option<f64>,
    pub quick_recipe: bool,
    pub tried: bool,
    pub favorite: bool,
    pub last_made: Option<String>,
    pub parsed_ingredients: Vec<IngredientSection>,
    pub ingredients_hash: Option<String>,
    pub raw_ingredients: Option<String>,
    #[serde(default)]
    pub directions: Option<String>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            file_path: PathBuf::from(format!("{}.md", name)),
            name,
            ..Default::default()
        }
    }

    /// True when the recipe's meal_type or any category names this meal.
    pub fn matches_meal(&self, meal: MealType) -> bool {
        let aliases = meal.aliases();
        let matches = |label: &str| aliases.contains(&label.trim().to_lowercase().as_str());
        self.meal_type.as_deref().is_some_and(|m| matches(m)) || self.categories.iter().any(|c| matches(c))
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.parsed_ingredients
            .iter()
            .flat_map(|section| section.items.iter())
            .map(|item| item.item.to_lowercase())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealSlot {
    pub day: usize,
    pub day_name: String,
    pub date: Option<NaiveDate>,
    pub meal_type: MealType,
    pub prep_style: PrepStyle,
    pub recipe: Recipe,
    pub servings: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientTarget {
    pub calories: f64,
    pub protein_g: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealPlan {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days: usize,
    pub calories_target: u32,
    pub protein_target: u32,
    pub meal_targets: BTreeMap<MealType, NutrientTarget>,
    pub slots: Vec<MealSlot>,
}

impl MealPlan {
    pub fn slots_for_day(&self, day: usize) -> impl Iterator<Item = &MealSlot> {
        self.slots.iter().filter(move |s| s.day == day)
    }

    pub fn day_calories(&self, day: usize) -> f64 {
        self.slots_for_day(day).map(|s| s.calories).sum()
    }

    pub fn day_protein(&self, day: usize) -> f64 {
        self.slots_for_day(day).map(|s| s.protein_g).sum()
    }

    pub fn total_calories(&self) -> f64 {
        self.slots.iter().map(|s| s.calories).sum()
    }

    pub fn total_protein(&self) -> f64 {
        self.slots.iter().map(|s| s.protein_g).sum()
    }

    pub fn unique_recipes(&self) -> BTreeSet<&str> {
        self.slots.iter().map(|s| s.recipe.name.as_str()).collect()
    }

    /// Fresh dinners plus one session per distinct batch recipe.
    pub fn cook_sessions(&self) -> usize {
        let fresh_dinners = self
            .slots
            .iter()
            .filter(|s| s.meal_type == MealType::Dinner && s.prep_style == PrepStyle::Fresh)
            .count();
        let batches: BTreeSet<&str> = self
            .slots
            .iter()
            .filter(|s| s.prep_style == PrepStyle::Batch)
            .map(|s| s.recipe.name.as_str())
            .collect();
        fresh_dinners + batches.len()
    }
}
