use anyhow::{anyhow, Context, Result};
use chrono::Local;
use meal_optim::api_connection::Provider;
use meal_optim::cli::{
    parse_args, resolve_start_date, Command, DocumentFormat, IndexArgs, PlanArgs, ScaleArgs,
    ShoppingListArgs, SuggestArgs, SuggestFormat,
};
use meal_optim::config::{apply_cli_overrides, load_config, CliOverrides, DEFAULT_COOKING_DIR};
use meal_optim::corpus::load_all_recipes;
use meal_optim::ingredient_extractor::{
    run_index, ExtractionOptions, IndexOptions, IngredientCache, API_KEY_ENV_VAR, CACHE_FILE,
};
use meal_optim::logging::init_logging;
use meal_optim::models::{MealType, Recipe};
use meal_optim::optim::{build_meal_plan, parse_pin, PlanOutcome, RecipeFilter, SearchSolver};
use meal_optim::render::{format_plan, format_plan_json, format_plan_recipes, PlanFormat};
use meal_optim::scale::{format_scaled_json, format_scaled_markdown, fuzzy_match_recipe, scale_recipe};
use meal_optim::shopping::{
    build_shopping_list, format_shopping_json, format_shopping_markdown, pantry_items,
    plan_shopping_list, SavedPlan,
};
use meal_optim::suggest::{format_json, format_table, suggest_recipes, SuggestRequest};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

async fn load_corpus(cooking_path: &Path) -> Result<Vec<Recipe>> {
    let mut recipes = load_all_recipes(cooking_path)
        .await
        .with_context(|| format!("Failed to load recipes from {:?}", cooking_path))?;
    let cache = IngredientCache::load(&cooking_path.join(CACHE_FILE)).await;
    let completed = cache.apply(&mut recipes);
    info!(recipes = recipes.len(), from_cache = completed, "Loaded recipe corpus");
    Ok(recipes)
}

async fn run_plan(vault_path: &Path, cooking_path: &Path, args: PlanArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let start = resolve_start_date(args.start_date.as_deref(), today)?;

    let config = load_config(vault_path)?;
    let mut config = apply_cli_overrides(
        config,
        CliOverrides {
            calories: args.calories,
            protein: args.protein,
            cook_days: args.cook_days.clone(),
            days: args.days,
            required_groups: args.normalized_groups(),
        },
    );
    if args.snacks {
        config.enable_snacks();
    }
    config.validate()?;
    let pantry = pantry_items(&config.pantry_staples, &args.pantry);

    let pins = args
        .pins
        .iter()
        .map(|p| parse_pin(p))
        .collect::<Result<Vec<_>, _>>()?;

    let recipes = load_corpus(cooking_path).await?;
    let exclude: Vec<String> = args
        .exclude
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    // The search is CPU-bound for up to the configured time limit.
    let outcome = tokio::task::spawn_blocking(move || {
        build_meal_plan(&recipes, &config, &exclude, &pins, Some(start), &SearchSolver)
    })
    .await
    .context("Planner task failed")??;

    let plan = match outcome {
        PlanOutcome::Planned(plan) => plan,
        PlanOutcome::Unsolved(status) => {
            eprintln!("Could not find a feasible meal plan ({:?}).", status);
            eprintln!("Try fewer pins, fewer required groups, or a recipe corpus with more variety.");
            return Err(anyhow!("Plan generation failed"));
        }
    };

    if let Some(path) = args.save_path(start) {
        let json = format_plan_json(&plan)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to save plan to {:?}", path))?;
        eprintln!("Plan saved to {}", path.display());
    }

    println!("{}", format_plan(&plan, args.format, today)?);
    if args.recipes && args.format == PlanFormat::Markdown {
        let recipes_md = format_plan_recipes(&plan);
        if !recipes_md.is_empty() {
            println!("{}", recipes_md);
        }
    }

    if args.shopping_list {
        let list = plan_shopping_list(&plan, &pantry);
        if list.is_empty() {
            warn!("No ingredients to list");
        } else if args.format == PlanFormat::Json {
            println!("{}", format_shopping_json(&list)?);
        } else {
            println!("---\n");
            println!("{}", format_shopping_markdown(&list));
        }
    }
    Ok(())
}

async fn run_shopping_list(vault_path: &Path, cooking_path: &Path, args: ShoppingListArgs) -> Result<()> {
    let config = load_config(vault_path)?;
    let pantry = pantry_items(&config.pantry_staples, &args.pantry);

    let json = match &args.plan_file {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read plan file {:?}", path))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read plan JSON from stdin")?;
            buffer
        }
    };
    let plan = SavedPlan::parse(&json)?;

    let recipes = load_corpus(cooking_path).await?;
    let list = build_shopping_list(&plan.servings(), &recipes, &pantry);
    if list.is_empty() {
        warn!("No ingredients to list");
        return Ok(());
    }
    match args.format {
        DocumentFormat::Markdown => println!("{}", format_shopping_markdown(&list)),
        DocumentFormat::Json => println!("{}", format_shopping_json(&list)?),
    }
    Ok(())
}

async fn run_scale(cooking_path: &Path, args: ScaleArgs) -> Result<()> {
    if !args.servings.is_finite() || args.servings <= 0.0 {
        return Err(anyhow!("--servings must be a positive number, got {}", args.servings));
    }
    let recipes = load_corpus(cooking_path).await?;
    let recipe = fuzzy_match_recipe(&args.recipe, &recipes)
        .ok_or_else(|| anyhow!("Recipe not found: {}", args.recipe))?;
    if recipe.parsed_ingredients.is_empty() {
        return Err(anyhow!(
            "Recipe '{}' has no parsed ingredients. Run 'index' first.",
            recipe.name
        ));
    }

    let scaled = scale_recipe(recipe, args.servings);
    match args.format {
        DocumentFormat::Markdown => println!("{}", format_scaled_markdown(&scaled)),
        DocumentFormat::Json => println!("{}", format_scaled_json(&scaled)?),
    }
    Ok(())
}

async fn run_suggest(cooking_path: &Path, args: SuggestArgs) -> Result<()> {
    let meal_type = match args.meal_type.as_deref() {
        Some(raw) => Some(MealType::parse(raw).ok_or_else(|| anyhow!("Unknown meal type '{}'", raw))?),
        None => None,
    };
    let recipes = load_corpus(cooking_path).await?;
    let request = SuggestRequest {
        filter: RecipeFilter {
            meal_type,
            max_time: args.max_time,
            cuisine: args.cuisine,
            dietary_tags: args.tags,
            exclude: args.exclude,
            min_protein: args.min_protein,
            max_calories: args.max_calories,
            ..Default::default()
        },
        available: args.have,
        target_calories: args.calories,
        target_protein: args.protein,
        limit: args.limit,
    };

    let scored = suggest_recipes(&recipes, &request, Local::now().date_naive());
    if scored.is_empty() {
        eprintln!("No recipes match the given filters.");
        return Ok(());
    }
    match args.format {
        SuggestFormat::Table => println!("{}", format_table(&scored)),
        SuggestFormat::Json => println!("{}", format_json(&scored)?),
    }
    Ok(())
}

async fn run_index_command(cooking_path: &Path, args: IndexArgs) -> Result<()> {
    let model = match args.model {
        Some(model) => model,
        None => Provider::openrouter(API_KEY_ENV_VAR)
            .default_model()
            .ok_or_else(|| anyhow!("No OpenRouter models configured"))?
            .to_string(),
    };
    let options = IndexOptions {
        dry_run: args.dry_run,
        skip_api: args.skip_api,
        limit: args.limit,
        extraction: ExtractionOptions {
            model,
            force: args.force,
            workers: args.workers.max(1),
        },
    };
    let progress_callback = |message: String| {
        eprintln!("{}", message);
    };
    let summary = run_index(cooking_path, &options, progress_callback).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize index summary")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys

    let cli = parse_args();
    init_logging(&cli.log_level, cli.log_file.as_deref())?;

    let cooking_path = cli.vault_path.join(DEFAULT_COOKING_DIR);
    match cli.command {
        Command::Plan(args) => run_plan(&cli.vault_path, &cooking_path, args).await,
        Command::Suggest(args) => run_suggest(&cooking_path, args).await,
        Command::Index(args) => run_index_command(&cooking_path, args).await,
        Command::ShoppingList(args) => run_shopping_list(&cli.vault_path, &cooking_path, args).await,
        Command::Scale(args) => run_scale(&cooking_path, args).await,
    }
}
