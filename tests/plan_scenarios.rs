use anyhow::Result;
use chrono::NaiveDate;
use meal_optim::config::PlannerConfig;
use meal_optim::corpus::load_all_recipes;
use meal_optim::error::PlanError;
use meal_optim::models::{MealPlan, MealType, PrepStyle, Recipe};
use meal_optim::optim::{build_meal_plan, parse_pin, PinSpec, PlanOutcome, SearchSolver, SolveStatus};
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

fn recipe(name: &str, meal: &str, calories: f64, protein: f64, main: Option<&str>) -> Recipe {
    let mut r = Recipe::new(name);
    r.meal_type = Some(meal.to_string());
    r.calories = Some(calories);
    r.protein_g = Some(protein);
    r.main_ingredient = main.map(|m| m.to_string());
    r
}

fn corpus() -> Vec<Recipe> {
    vec![
        recipe("Breakfast Slop", "breakfast", 450.0, 30.0, Some("oats")),
        recipe("Greek Yogurt Bowl", "breakfast", 350.0, 25.0, None),
        recipe("Egg Muffins", "breakfast", 300.0, 22.0, Some("eggs")),
        recipe("Overnight Oats", "breakfast", 400.0, 15.0, Some("oats")),
        recipe("Turkey Wrap", "lunch", 450.0, 35.0, Some("ground turkey")),
        recipe("Lentil Salad", "lunch", 420.0, 22.0, Some("lentils")),
        recipe("Tuna Melt", "lunch", 500.0, 32.0, Some("tuna")),
        recipe("Miso Noodle Bowl", "lunch", 380.0, 18.0, Some("noodles")),
        recipe("Chicken Tikka Masala", "dinner", 550.0, 40.0, Some("chicken")),
        recipe("Beef Stew Recipe", "dinner", 480.0, 35.0, Some("beef")),
        recipe("Pad See Ew", "dinner", 500.0, 25.0, None),
        recipe("Chicken Parmesan", "dinner", 600.0, 45.0, Some("chicken breast")),
        recipe("Black Bean Chili", "dinner", 520.0, 28.0, Some("black beans")),
        recipe("Trail Mix", "snack", 200.0, 6.0, None),
        recipe("Protein Bar", "snack", 220.0, 20.0, None),
        recipe("Hummus Plate", "snack", 250.0, 9.0, Some("chickpeas")),
    ]
}

/// Monday to Wednesday, cooking every day, fresh breakfast and lunch.
fn three_day_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.schedule.plan_days = 3;
    config.schedule.meals_per_day = vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner];
    config.schedule.cook_days = ["monday", "tuesday", "wednesday"]
        .iter()
        .map(|d| d.to_string())
        .collect();
    config.prep_styles.breakfast = PrepStyle::Fresh;
    config.prep_styles.lunch = PrepStyle::Fresh;
    config.solver.time_limit_seconds = 2.0;
    config
}

fn monday() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2026, 10, 19)
}

fn plan(recipes: &[Recipe], config: &PlannerConfig, pins: &[&str]) -> Result<PlanOutcome, PlanError> {
    let pins: Vec<PinSpec> = pins.iter().map(|p| parse_pin(p)).collect::<Result<_, _>>()?;
    build_meal_plan(recipes, config, &[], &pins, monday(), &SearchSolver)
}

fn expect_plan(outcome: Result<PlanOutcome, PlanError>) -> MealPlan {
    match outcome {
        Ok(PlanOutcome::Planned(plan)) => plan,
        other => panic!("expected a plan, got {:?}", other),
    }
}

fn dinner_names(plan: &MealPlan) -> Vec<&str> {
    plan.slots
        .iter()
        .filter(|s| s.meal_type == MealType::Dinner)
        .map(|s| s.recipe.name.as_str())
        .collect()
}

fn write_recipe(dir: &TempDir, r: &Recipe) -> Result<()> {
    let mut front = format!(
        "---\ntype: recipe\nmeal_type: {}\ncalories: {}\nprotein_g: {}\n",
        r.meal_type.as_deref().unwrap_or_default(),
        r.calories.unwrap_or_default(),
        r.protein_g.unwrap_or_default()
    );
    if let Some(main) = &r.main_ingredient {
        front.push_str(&format!("main_ingredient: {}\n", main));
    }
    front.push_str("---\n\n## Ingredients\n\n- 1 cup something\n");
    fs::write(dir.path().join(format!("{}.md", r.name)), front)?;
    Ok(())
}

#[tokio::test]
async fn test_three_day_plan_from_vault_files() -> Result<()> {
    let dir = TempDir::new()?;
    for r in corpus() {
        write_recipe(&dir, &r)?;
    }
    fs::write(dir.path().join("Shopping.md"), "---\ntype: note\n---\nnot a recipe\n")?;

    let recipes = load_all_recipes(dir.path()).await?;
    assert_eq!(recipes.len(), corpus().len());

    let plan = expect_plan(plan(&recipes, &three_day_config(), &[]));
    assert_eq!(plan.slots.len(), 9);
    assert_eq!(plan.end_date, NaiveDate::from_ymd_opt(2026, 10, 21));
    for day in 0..3 {
        let meals: Vec<MealType> = plan.slots_for_day(day).map(|s| s.meal_type).collect();
        assert_eq!(meals, vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner]);
    }

    let dinners = dinner_names(&plan);
    let distinct: HashSet<&str> = dinners.iter().copied().collect();
    assert_eq!(distinct.len(), 3, "dinners repeat: {:?}", dinners);
    // Chicken Tikka Masala and Chicken Parmesan are both poultry
    assert!(!(distinct.contains("Chicken Tikka Masala") && distinct.contains("Chicken Parmesan")));
    assert!(plan.slots.iter().all(|s| !s.pinned));
    assert!(plan.slots.iter().all(|s| (0.5..=4.0).contains(&s.servings)));
    Ok(())
}

#[test]
fn test_pinned_wednesday_dinner() {
    let recipes = corpus();
    let plan = expect_plan(plan(
        &recipes,
        &three_day_config(),
        &["wednesday:dinner:Chicken Tikka Masala"],
    ));

    let wednesday = plan
        .slots_for_day(2)
        .find(|s| s.meal_type == MealType::Dinner)
        .unwrap();
    assert_eq!(wednesday.recipe.name, "Chicken Tikka Masala");
    assert!(wednesday.pinned);
    assert_eq!(wednesday.day_name, "Wednesday");

    let pinned = plan.slots.iter().filter(|s| s.pinned).count();
    assert_eq!(pinned, 1);
}

#[test]
fn test_batch_breakfast_pinned_for_every_day() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.prep_styles.breakfast = PrepStyle::Batch;
    let plan = expect_plan(plan(&recipes, &config, &["all:breakfast:Breakfast Slop"]));

    let breakfasts: Vec<_> = plan
        .slots
        .iter()
        .filter(|s| s.meal_type == MealType::Breakfast)
        .collect();
    assert_eq!(breakfasts.len(), 3);
    for slot in breakfasts {
        assert_eq!(slot.recipe.name, "Breakfast Slop");
        assert!(slot.pinned);
        assert_eq!(slot.prep_style, PrepStyle::Batch);
    }
}

#[test]
fn test_batch_breakfast_rejects_single_day_pin() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.prep_styles.breakfast = PrepStyle::Batch;
    let result = plan(&recipes, &config, &["monday:breakfast:Breakfast Slop"]);
    assert_eq!(
        result,
        Err(PlanError::BatchBreakfastPattern {
            pattern: "monday".to_string(),
            query: "Breakfast Slop".to_string(),
        })
    );
}

#[test]
fn test_required_groups_are_covered() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.preferences.required_ingredient_groups = vec!["beef".to_string(), "legumes".to_string()];
    let plan = expect_plan(plan(&recipes, &config, &[]));

    let dinners = dinner_names(&plan);
    assert!(dinners.contains(&"Beef Stew Recipe"), "{:?}", dinners);
    assert!(dinners.contains(&"Black Bean Chili"), "{:?}", dinners);
}

#[test]
fn test_missing_required_group_is_skipped() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.preferences.required_ingredient_groups = vec!["seafood".to_string()];
    let plan = expect_plan(plan(&recipes, &config, &[]));
    assert_eq!(plan.slots.len(), 9);
}

#[test]
fn test_conflicting_pins_name_both_recipes() {
    let recipes = corpus();
    let result = plan(
        &recipes,
        &three_day_config(),
        &["wednesday:dinner:Chicken Tikka Masala", "all:dinner:Pad See Ew"],
    );
    assert_eq!(
        result,
        Err(PlanError::PinConflict {
            day: "Wednesday".to_string(),
            meal: MealType::Dinner,
            first: "Chicken Tikka Masala".to_string(),
            second: "Pad See Ew".to_string(),
        })
    );
}

#[test]
fn test_unknown_pinned_recipe_fails() {
    let recipes = corpus();
    let result = plan(&recipes, &three_day_config(), &["monday:dinner:Lobster Thermidor"]);
    assert_eq!(
        result,
        Err(PlanError::RecipeNotFound("Lobster Thermidor".to_string()))
    );
}

#[test]
fn test_too_few_dinners_is_unsolved() {
    let recipes: Vec<Recipe> = corpus()
        .into_iter()
        .filter(|r| !matches!(r.name.as_str(), "Pad See Ew" | "Chicken Parmesan" | "Black Bean Chili"))
        .collect();
    let result = plan(&recipes, &three_day_config(), &[]);
    assert_eq!(result, Ok(PlanOutcome::Unsolved(SolveStatus::Infeasible)));
}

#[test]
fn test_snacks_add_a_fourth_slot() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.enable_snacks();
    let plan = expect_plan(plan(&recipes, &config, &[]));
    assert_eq!(plan.slots.len(), 12);
    let snacks: HashSet<&str> = plan
        .slots
        .iter()
        .filter(|s| s.meal_type == MealType::Snack)
        .map(|s| s.recipe.name.as_str())
        .collect();
    assert_eq!(snacks.len(), 3);
    assert!(plan.meal_targets.contains_key(&MealType::Snack));
}

#[test]
fn test_even_dinner_pin_repeats_and_keeps_the_rest_distinct() {
    let recipes = corpus();
    let mut config = three_day_config();
    config.schedule.plan_days = 5;
    config.schedule.cook_days = ["monday", "tuesday", "wednesday", "thursday", "friday"]
        .iter()
        .map(|d| d.to_string())
        .collect();
    let plan = expect_plan(plan(&recipes, &config, &["even:dinner:Pad See Ew"]));

    let dinners: Vec<(usize, &str, bool)> = plan
        .slots
        .iter()
        .filter(|s| s.meal_type == MealType::Dinner)
        .map(|s| (s.day, s.recipe.name.as_str(), s.pinned))
        .collect();
    assert_eq!(dinners.len(), 5);
    for (day, name, pinned) in &dinners {
        assert_eq!(*pinned, day % 2 == 0, "{:?}", dinners);
        if day % 2 == 0 {
            assert_eq!(*name, "Pad See Ew");
        }
    }
    // Tuesday and Thursday are free decisions and must differ
    assert_ne!(dinners[1].1, dinners[3].1, "{:?}", dinners);
}

#[test]
fn test_all_dinner_pin_fills_every_day() {
    let recipes = corpus();
    let plan = expect_plan(plan(&recipes, &three_day_config(), &["all:dinner:Black Bean Chili"]));

    assert_eq!(dinner_names(&plan), vec!["Black Bean Chili"; 3]);
    assert!(plan
        .slots
        .iter()
        .all(|s| s.pinned == (s.meal_type == MealType::Dinner)));
}

#[test]
fn test_pin_on_leftover_day_marks_the_slot() {
    // default week: cook Sunday and Wednesday, Monday dinner is Sunday's leftovers
    let recipes = corpus();
    let mut config = PlannerConfig::default();
    config.schedule.meals_per_day = vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner];
    config.solver.time_limit_seconds = 2.0;
    let plan = expect_plan(plan(&recipes, &config, &["monday:dinner:Black Bean Chili"]));

    let monday = plan
        .slots_for_day(0)
        .find(|s| s.meal_type == MealType::Dinner)
        .unwrap();
    assert_eq!(monday.prep_style, PrepStyle::Leftover);
    assert!(monday.pinned);
    let pinned: Vec<(usize, MealType)> = plan
        .slots
        .iter()
        .filter(|s| s.pinned)
        .map(|s| (s.day, s.meal_type))
        .collect();
    assert_eq!(pinned, vec![(0, MealType::Dinner)]);
}
