use crate::models::MealType;
use thiserror::Error;

/// Input-validation and lookup failures raised while preparing a plan.
///
/// An infeasible model is not an error; see `optim::planner::PlanOutcome`.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Invalid pin format: '{0}'. Expected 'day:meal:Recipe Name'")]
    InvalidPinFormat(String),

    #[error("Unknown day '{0}' in pin. Use a day name, 'all', 'even', or 'odd'")]
    UnknownDay(String),

    #[error("Unknown meal type '{0}' in pin. Valid: breakfast, lunch, dinner, snack")]
    UnknownMealType(String),

    #[error("Empty recipe name in pin: '{0}'")]
    EmptyRecipeName(String),

    #[error(
        "Cannot pin {pattern} breakfast in batch mode. Use 'all:breakfast:{query}' or set breakfast prep_style to fresh"
    )]
    BatchBreakfastPattern { pattern: String, query: String },

    #[error("No recipe found matching '{0}'")]
    RecipeNotFound(String),

    #[error("Conflicting pins for {day} {meal}: '{first}' vs '{second}'")]
    PinConflict {
        day: String,
        meal: MealType,
        first: String,
        second: String,
    },

    #[error("No {0} candidates with calorie data are available")]
    EmptyPool(MealType),

    #[error("Invalid solver time limit: {0} seconds")]
    InvalidTimeLimit(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
