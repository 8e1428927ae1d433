use crate::error::ConfigError;
use crate::models::{MealType, PrepStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_COOKING_DIR: &str = "03. Resources/Cooking";
pub const PREFERENCES_FILE: &str = "meal-preferences.yaml";

const SNACK_SHARE: f64 = 0.15;

/// Longest accepted solver budget, one hour.
pub const MAX_TIME_LIMIT_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealAllocation {
    pub breakfast: f64,
    pub lunch: f64,
    pub dinner: f64,
    pub snack: f64,
}

impl MealAllocation {
    pub fn get(&self, meal: MealType) -> f64 {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
            MealType::Snack => self.snack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionConfig {
    pub daily_calories: u32,
    pub daily_protein_g: u32,
    pub meal_allocation: MealAllocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepStyles {
    pub breakfast: PrepStyle,
    pub lunch: PrepStyle,
    pub dinner: PrepStyle,
    pub snack: PrepStyle,
}

impl PrepStyles {
    pub fn get(&self, meal: MealType) -> PrepStyle {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
            MealType::Snack => self.snack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub cook_days: Vec<String>,
    pub meals_per_day: Vec<MealType>,
    pub plan_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub max_prep_time_minutes: Option<u32>,
    pub max_batch_time_minutes: Option<u32>,
    pub dietary_tags: Vec<String>,
    pub cuisines_excluded: Vec<String>,
    pub ingredients_excluded: Vec<String>,
    pub required_ingredient_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_limit_seconds: f64,
    pub calorie_weight: i64,
    pub protein_weight: i64,
}

/// Fully-resolved planner configuration. Every field has a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub nutrition: NutritionConfig,
    pub prep_styles: PrepStyles,
    pub schedule: ScheduleConfig,
    pub preferences: Preferences,
    pub solver: SolverConfig,
    pub pantry_staples: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            nutrition: NutritionConfig {
                daily_calories: 2200,
                daily_protein_g: 150,
                meal_allocation: MealAllocation {
                    breakfast: 0.20,
                    lunch: 0.30,
                    dinner: 0.35,
                    snack: 0.15,
                },
            },
            prep_styles: PrepStyles {
                breakfast: PrepStyle::Batch,
                lunch: PrepStyle::Leftover,
                dinner: PrepStyle::Fresh,
                snack: PrepStyle::Fresh,
            },
            schedule: ScheduleConfig {
                cook_days: vec!["sunday".to_string(), "wednesday".to_string()],
                meals_per_day: MealType::ALL.to_vec(),
                plan_days: 7,
            },
            preferences: Preferences {
                max_prep_time_minutes: Some(60),
                max_batch_time_minutes: Some(120),
                dietary_tags: Vec::new(),
                cuisines_excluded: Vec::new(),
                ingredients_excluded: Vec::new(),
                required_ingredient_groups: Vec::new(),
            },
            solver: SolverConfig {
                time_limit_seconds: 30.0,
                calorie_weight: 10,
                protein_weight: 15,
            },
            pantry_staples: [
                "salt",
                "black pepper",
                "olive oil",
                "butter",
                "garlic",
                "onion",
                "rice",
                "eggs",
                "soy sauce",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// Partial overlays, as read from meal-preferences.yaml or built from CLI flags.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MealAllocationOverrides {
    pub breakfast: Option<f64>,
    pub lunch: Option<f64>,
    pub dinner: Option<f64>,
    pub snack: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NutritionOverrides {
    pub daily_calories: Option<u32>,
    pub daily_protein_g: Option<u32>,
    pub meal_allocation: Option<MealAllocationOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrepStyleOverrides {
    pub breakfast: Option<PrepStyle>,
    pub lunch: Option<PrepStyle>,
    pub dinner: Option<PrepStyle>,
    pub snack: Option<PrepStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleOverrides {
    pub cook_days: Option<Vec<String>>,
    pub meals_per_day: Option<Vec<MealType>>,
    pub plan_days: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreferenceOverrides {
    pub max_prep_time_minutes: Option<u32>,
    pub max_batch_time_minutes: Option<u32>,
    pub dietary_tags: Option<Vec<String>>,
    pub cuisines_excluded: Option<Vec<String>>,
    pub ingredients_excluded: Option<Vec<String>>,
    pub required_ingredient_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverOverrides {
    pub time_limit_seconds: Option<f64>,
    pub calorie_weight: Option<i64>,
    pub protein_weight: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub nutrition: Option<NutritionOverrides>,
    pub prep_styles: Option<PrepStyleOverrides>,
    pub schedule: Option<ScheduleOverrides>,
    pub preferences: Option<PreferenceOverrides>,
    pub solver: Option<SolverOverrides>,
    pub pantry_staples: Option<Vec<String>>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl PlannerConfig {
    /// Overlays every set leaf of `overrides` onto `self`. Unset leaves keep their value.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(n) = overrides.nutrition {
            set(&mut self.nutrition.daily_calories, n.daily_calories);
            set(&mut self.nutrition.daily_protein_g, n.daily_protein_g);
            if let Some(a) = n.meal_allocation {
                let alloc = &mut self.nutrition.meal_allocation;
                set(&mut alloc.breakfast, a.breakfast);
                set(&mut alloc.lunch, a.lunch);
                set(&mut alloc.dinner, a.dinner);
                set(&mut alloc.snack, a.snack);
            }
        }
        if let Some(p) = overrides.prep_styles {
            set(&mut self.prep_styles.breakfast, p.breakfast);
            set(&mut self.prep_styles.lunch, p.lunch);
            set(&mut self.prep_styles.dinner, p.dinner);
            set(&mut self.prep_styles.snack, p.snack);
        }
        if let Some(s) = overrides.schedule {
            set(&mut self.schedule.cook_days, s.cook_days);
            set(&mut self.schedule.meals_per_day, s.meals_per_day);
            set(&mut self.schedule.plan_days, s.plan_days);
        }
        if let Some(p) = overrides.preferences {
            let prefs = &mut self.preferences;
            if p.max_prep_time_minutes.is_some() {
                prefs.max_prep_time_minutes = p.max_prep_time_minutes;
            }
            if p.max_batch_time_minutes.is_some() {
                prefs.max_batch_time_minutes = p.max_batch_time_minutes;
            }
            set(&mut prefs.dietary_tags, p.dietary_tags);
            set(&mut prefs.cuisines_excluded, p.cuisines_excluded);
            set(&mut prefs.ingredients_excluded, p.ingredients_excluded);
            set(&mut prefs.required_ingredient_groups, p.required_ingredient_groups);
        }
        if let Some(s) = overrides.solver {
            set(&mut self.solver.time_limit_seconds, s.time_limit_seconds);
            set(&mut self.solver.calorie_weight, s.calorie_weight);
            set(&mut self.solver.protein_weight, s.protein_weight);
        }
        set(&mut self.pantry_staples, overrides.pantry_staples);
        self
    }

    pub fn snacks_enabled(&self) -> bool {
        self.schedule.meals_per_day.contains(&MealType::Snack)
    }

    /// Adds the snack slot. A zero snack allocation takes 15% of the day,
    /// scaling the other meals down to the remaining 85%.
    pub fn enable_snacks(&mut self) {
        if !self.snacks_enabled() {
            self.schedule.meals_per_day.push(MealType::Snack);
        }
        let alloc = &mut self.nutrition.meal_allocation;
        if alloc.snack <= 0.0 {
            let scale = 1.0 - SNACK_SHARE;
            alloc.breakfast *= scale;
            alloc.lunch *= scale;
            alloc.dinner *= scale;
            alloc.snack = SNACK_SHARE;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.plan_days == 0 {
            return Err(ConfigError::Invalid("plan_days must be at least 1".to_string()));
        }
        let limit = self.solver.time_limit_seconds;
        if !limit.is_finite() || limit <= 0.0 || limit > MAX_TIME_LIMIT_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "solver.time_limit_seconds must be in (0, {}], got {}",
                MAX_TIME_LIMIT_SECONDS, limit
            )));
        }
        Ok(())
    }
}

/// Flat command-line flags that map into the nested configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub calories: Option<u32>,
    pub protein: Option<u32>,
    /// Comma-separated weekday names.
    pub cook_days: Option<String>,
    pub days: Option<usize>,
    pub required_groups: Vec<String>,
}

impl From<CliOverrides> for ConfigOverrides {
    fn from(cli: CliOverrides) -> Self {
        let cook_days = cli.cook_days.map(|days| {
            days.split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        });
        let required = if cli.required_groups.is_empty() {
            None
        } else {
            Some(cli.required_groups)
        };
        ConfigOverrides {
            nutrition: Some(NutritionOverrides {
                daily_calories: cli.calories,
                daily_protein_g: cli.protein,
                meal_allocation: None,
            }),
            schedule: Some(ScheduleOverrides {
                cook_days,
                meals_per_day: None,
                plan_days: cli.days,
            }),
            preferences: Some(PreferenceOverrides {
                required_ingredient_groups: required,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

pub fn apply_cli_overrides(config: PlannerConfig, cli: CliOverrides) -> PlannerConfig {
    config.merge(cli.into())
}

/// Loads `<vault>/03. Resources/Cooking/meal-preferences.yaml` over the defaults.
/// A missing file yields the defaults.
pub fn load_config(vault_path: &Path) -> Result<PlannerConfig, ConfigError> {
    let path = vault_path.join(DEFAULT_COOKING_DIR).join(PREFERENCES_FILE);
    load_config_file(&path)
}

pub fn load_config_file(path: &Path) -> Result<PlannerConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "No preferences file, using defaults");
        return Ok(PlannerConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let overrides = parse_overrides(&content).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    let config = PlannerConfig::default().merge(overrides);
    config.validate()?;
    Ok(config)
}

fn parse_overrides(content: &str) -> Result<ConfigOverrides, serde_yaml::Error> {
    // An empty document deserialises to unit, not to an empty mapping.
    if content.trim().is_empty() {
        return Ok(ConfigOverrides::default());
    }
    serde_yaml::from_str(content)
}
