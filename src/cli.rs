use crate::error::ConfigError;
use crate::render::PlanFormat;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weekly meal planning over an Obsidian recipe vault", long_about = None)]
pub struct Cli {
    /// Obsidian vault root
    #[arg(long, global = true, default_value = ".")]
    pub vault_path: PathBuf,

    /// debug, info, warn or error
    #[arg(long, global = true, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Also append log events to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a weekly meal plan
    Plan(PlanArgs),
    /// Rank recipes against filters, pantry and macro targets
    Suggest(SuggestArgs),
    /// Report corpus statistics and extract structured ingredients
    Index(IndexArgs),
    /// Build a shopping list from a saved plan
    ShoppingList(ShoppingListArgs),
    /// Scale a recipe's ingredients to a number of servings
    Scale(ScaleArgs),
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// First day of the plan (YYYY-MM-DD, a Monday). Defaults to next Monday.
    #[arg(long)]
    pub start_date: Option<String>,

    #[arg(long)]
    pub days: Option<usize>,

    /// Daily calorie target
    #[arg(long)]
    pub calories: Option<u32>,

    /// Daily protein target in grams
    #[arg(long)]
    pub protein: Option<u32>,

    /// Comma-separated weekdays, e.g. sunday,wednesday
    #[arg(long)]
    pub cook_days: Option<String>,

    /// Comma-separated recipe-name substrings to leave out
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated items on hand, left off the shopping list
    #[arg(long, value_delimiter = ',')]
    pub pantry: Vec<String>,

    /// Add a snack slot to every day
    #[arg(long)]
    pub snacks: bool,

    /// Pin a recipe: day:meal:Recipe Name (day may be all, even or odd)
    #[arg(long = "pin")]
    pub pins: Vec<String>,

    /// Ingredient group at least one dinner must come from
    #[arg(long = "require-group")]
    pub require_groups: Vec<String>,

    #[arg(long, value_enum, default_value_t = PlanFormat::Markdown)]
    pub format: PlanFormat,

    /// Append each planned recipe, scaled, with its directions (markdown only)
    #[arg(long)]
    pub recipes: bool,

    /// Append a shopping list for the plan
    #[arg(long)]
    pub shopping_list: bool,

    /// Write the plan as JSON (default file name meal-plan-<start>.json)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub save_plan: Option<String>,
}

impl PlanArgs {
    /// Required group names as matched against the group table.
    pub fn normalized_groups(&self) -> Vec<String> {
        self.require_groups
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect()
    }

    /// Where `--save-plan` should write, if it was given.
    pub fn save_path(&self, start: NaiveDate) -> Option<PathBuf> {
        self.save_plan.as_ref().map(|p| {
            if p.is_empty() {
                PathBuf::from(format!("meal-plan-{}.json", start.format("%Y-%m-%d")))
            } else {
                PathBuf::from(p)
            }
        })
    }
}

/// Output of the `shopping-list` and `scale` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Markdown,
    Json,
}

#[derive(Args, Debug)]
pub struct ShoppingListArgs {
    /// Plan JSON written by `plan --save-plan`. Reads stdin when absent.
    #[arg(long)]
    pub plan_file: Option<PathBuf>,

    /// Comma-separated pantry items to subtract
    #[arg(long, value_delimiter = ',')]
    pub pantry: Vec<String>,

    #[arg(long, value_enum, default_value_t = DocumentFormat::Markdown)]
    pub format: DocumentFormat,
}

#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Recipe name, fuzzy matched
    pub recipe: String,

    #[arg(long)]
    pub servings: f64,

    #[arg(long, value_enum, default_value_t = DocumentFormat::Markdown)]
    pub format: DocumentFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuggestFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// breakfast, lunch, dinner or snack
    #[arg(long)]
    pub meal_type: Option<String>,

    /// Maximum total time in minutes
    #[arg(long)]
    pub max_time: Option<u32>,

    #[arg(long)]
    pub cuisine: Option<String>,

    /// Comma-separated dietary tags that must all be present
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Comma-separated recipe-name substrings to leave out
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated ingredients on hand
    #[arg(long, value_delimiter = ',')]
    pub have: Vec<String>,

    /// Target calories for one meal
    #[arg(long)]
    pub calories: Option<u32>,

    /// Target protein for one meal
    #[arg(long)]
    pub protein: Option<u32>,

    #[arg(long)]
    pub min_protein: Option<f64>,

    #[arg(long)]
    pub max_calories: Option<f64>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, value_enum, default_value_t = SuggestFormat::Table)]
    pub format: SuggestFormat,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Only report statistics
    #[arg(long)]
    pub dry_run: bool,

    /// Skip LLM ingredient extraction
    #[arg(long)]
    pub skip_api: bool,

    /// Process only the first N recipe files
    #[arg(long)]
    pub limit: Option<usize>,

    /// Re-extract recipes that are already cached
    #[arg(long)]
    pub force: bool,

    /// Concurrent extraction requests
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// OpenRouter model id
    #[arg(long)]
    pub model: Option<String>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// The first Monday strictly after `today`.
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let ahead = 7 - today.weekday().num_days_from_monday() as u64;
    today + Days::new(ahead)
}

/// Parses `--start-date`, or picks next Monday when absent.
pub fn resolve_start_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
    let Some(raw) = raw else {
        return Ok(next_monday(today));
    };
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ConfigError::Invalid(format!("invalid start date '{}': {}", raw, e)))?;
    if date.weekday() != Weekday::Mon {
        return Err(ConfigError::Invalid(format!(
            "start date {} is a {}, plans start on a Monday",
            date,
            date.weekday()
        )));
    }
    Ok(date)
}
