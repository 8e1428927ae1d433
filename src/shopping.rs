use crate::models::{MealPlan, ParsedIngredient, Recipe};
use anyhow::{Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use tracing::warn;

/// Store aisles, in the order a shopping list is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreSection {
    Produce,
    MeatSeafood,
    Dairy,
    Pantry,
    SpicesCondiments,
    Frozen,
    Other,
}

impl StoreSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreSection::Produce => "Produce",
            StoreSection::MeatSeafood => "Meat & Seafood",
            StoreSection::Dairy => "Dairy",
            StoreSection::Pantry => "Pantry",
            StoreSection::SpicesCondiments => "Spices & Condiments",
            StoreSection::Frozen => "Frozen",
            StoreSection::Other => "Other",
        }
    }
}

impl fmt::Display for StoreSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// First section with a keyword contained in the item name wins.
const SECTION_KEYWORDS: &[(StoreSection, &[&str])] = &[
    (
        StoreSection::Produce,
        &[
            "lettuce", "tomato", "onion", "garlic", "pepper", "carrot", "celery", "potato",
            "broccoli", "spinach", "kale", "cabbage", "zucchini", "mushroom", "avocado", "lemon",
            "lime", "ginger", "cilantro", "parsley", "basil", "mint", "green onion", "scallion",
            "jalapeño", "jalapeno", "cucumber", "corn", "peas", "bean sprout", "apple", "banana",
            "berry", "mango", "orange", "squash", "sweet potato", "cauliflower", "asparagus",
            "eggplant", "beet", "radish",
        ],
    ),
    (
        StoreSection::MeatSeafood,
        &[
            "chicken", "beef", "pork", "turkey", "salmon", "shrimp", "fish", "sausage", "bacon",
            "ground", "steak", "thigh", "breast", "drumstick", "lamb", "tilapia", "tuna", "crab",
            "meatball", "chorizo",
        ],
    ),
    (
        StoreSection::Dairy,
        &[
            "cheese", "milk", "cream", "yogurt", "butter", "egg", "sour cream", "cream cheese",
            "mozzarella", "parmesan", "cheddar", "ricotta", "cottage cheese", "whipping cream",
            "half and half",
        ],
    ),
    (
        StoreSection::Pantry,
        &[
            "rice", "pasta", "noodle", "flour", "sugar", "oil", "vinegar", "broth", "stock", "can",
            "canned", "beans", "lentil", "chickpea", "coconut milk", "tomato sauce", "tomato paste",
            "soy sauce", "tortilla", "bread", "bun", "pita", "wrap",
        ],
    ),
    (
        StoreSection::SpicesCondiments,
        &[
            "salt", "pepper", "cumin", "paprika", "oregano", "thyme", "cinnamon", "chili powder",
            "curry", "turmeric", "cayenne", "nutmeg", "garlic powder", "onion powder", "bay leaf",
            "red pepper flake", "hot sauce", "sriracha", "mustard", "ketchup", "mayo", "mayonnaise",
            "honey", "maple syrup", "worcestershire",
        ],
    ),
    (StoreSection::Frozen, &["frozen", "ice cream"]),
];

pub fn classify_section(item: &str) -> StoreSection {
    let name = item.to_lowercase();
    SECTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| name.contains(kw)))
        .map(|(section, _)| *section)
        .unwrap_or(StoreSection::Other)
}

/// Canonical unit spelling so "tablespoons" and "Tbsp" add up. Unknown
/// units pass through unchanged.
pub fn normalize_unit(unit: Option<&str>) -> String {
    let Some(unit) = unit.filter(|u| !u.trim().is_empty()) else {
        return String::new();
    };
    let key = unit.trim().to_lowercase();
    let canonical = match key.trim_end_matches('.') {
        "tablespoon" | "tablespoons" | "tbsp" | "tbs" => "Tbsp",
        "teaspoon" | "teaspoons" | "tsp" => "tsp",
        "cup" | "cups" | "c" => "cup",
        "ounce" | "ounces" | "oz" => "oz",
        "pound" | "pounds" | "lb" | "lbs" => "lb",
        "can" | "cans" => "can",
        "clove" | "cloves" => "clove",
        "slice" | "slices" => "slice",
        "piece" | "pieces" => "piece",
        _ => return unit.to_string(),
    };
    canonical.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingItem {
    pub item: String,
    pub qty: f64,
    pub unit: String,
    pub notes: Vec<String>,
}

/// Aggregated items grouped by store section, sections in aisle order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShoppingList {
    sections: Vec<(StoreSection, Vec<ShoppingItem>)>,
}

impl ShoppingList {
    pub fn sections(&self) -> &[(StoreSection, Vec<ShoppingItem>)] {
        &self.sections
    }

    pub fn section(&self, section: StoreSection) -> Option<&[ShoppingItem]> {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, items)| items.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// A JSON object keyed by section name, keys in aisle order.
impl Serialize for ShoppingList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (section, items) in &self.sections {
            map.serialize_entry(section.as_str(), items)?;
        }
        map.end()
    }
}

/// Pantry items from config plus any given on the command line.
pub fn pantry_items(staples: &[String], extra: &[String]) -> Vec<String> {
    staples
        .iter()
        .chain(extra)
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Sums quantities per (item, unit) across scaled ingredient lists.
///
/// An item is left out when it contains a pantry entry or is contained in
/// one ("kosher salt" and "salt" both match pantry "salt").
pub fn aggregate_ingredients(lists: &[(Vec<&ParsedIngredient>, f64)], pantry: &[String]) -> ShoppingList {
    let mut totals: BTreeMap<(String, String), ShoppingItem> = BTreeMap::new();

    for (ingredients, scale) in lists {
        for ingredient in ingredients {
            let key = ingredient.item.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if pantry
                .iter()
                .any(|p| key.contains(p.as_str()) || p.contains(key.as_str()))
            {
                continue;
            }
            let unit = normalize_unit(ingredient.unit.as_deref());
            let entry = totals
                .entry((key, unit.clone()))
                .or_insert_with(|| ShoppingItem {
                    item: ingredient.item.trim().to_string(),
                    qty: 0.0,
                    unit,
                    notes: Vec::new(),
                });
            if let Some(qty) = ingredient.qty {
                entry.qty += qty * scale;
            }
            if let Some(notes) = ingredient.notes.as_deref() {
                if !entry.notes.iter().any(|n| n == notes) {
                    entry.notes.push(notes.to_string());
                }
            }
        }
    }

    let mut by_section: BTreeMap<StoreSection, Vec<ShoppingItem>> = BTreeMap::new();
    for item in totals.into_values() {
        by_section.entry(classify_section(&item.item)).or_default().push(item);
    }
    let sections = by_section
        .into_iter()
        .map(|(section, mut items)| {
            items.sort_by_key(|i| i.item.to_lowercase());
            (section, items)
        })
        .collect();
    ShoppingList { sections }
}

/// Total servings per recipe name, in first-seen order.
pub fn recipe_servings<'a, I>(slots: I) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (name, servings) in slots {
        if name.is_empty() {
            continue;
        }
        match index.get(name) {
            Some(i) => order[*i].1 += servings,
            None => {
                index.insert(name.to_string(), order.len());
                order.push((name.to_string(), servings));
            }
        }
    }
    order
}

pub fn plan_servings(plan: &MealPlan) -> Vec<(String, f64)> {
    recipe_servings(plan.slots.iter().map(|s| (s.recipe.name.as_str(), s.servings)))
}

fn default_servings() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedSlot {
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default = "default_servings")]
    pub servings: f64,
}

/// The parts of a saved plan JSON a shopping list needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedPlan {
    #[serde(default)]
    pub slots: Vec<SavedSlot>,
}

impl SavedPlan {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse plan JSON")
    }

    pub fn servings(&self) -> Vec<(String, f64)> {
        recipe_servings(
            self.slots
                .iter()
                .filter_map(|s| s.recipe.as_deref().map(|r| (r, s.servings))),
        )
    }
}

/// Scales each planned recipe's parsed ingredients to the servings eaten
/// and aggregates them. Recipes missing from the corpus or without parsed
/// ingredients are skipped with a warning.
pub fn build_shopping_list(servings: &[(String, f64)], recipes: &[Recipe], pantry: &[String]) -> ShoppingList {
    let by_name: HashMap<&str, &Recipe> = recipes.iter().map(|r| (r.name.as_str(), r)).collect();
    shopping_list_from(servings, &by_name, pantry)
}

/// Shopping list for a freshly built plan, using the recipes it carries.
pub fn plan_shopping_list(plan: &MealPlan, pantry: &[String]) -> ShoppingList {
    let by_name: HashMap<&str, &Recipe> = plan
        .slots
        .iter()
        .map(|s| (s.recipe.name.as_str(), &s.recipe))
        .collect();
    shopping_list_from(&plan_servings(plan), &by_name, pantry)
}

fn shopping_list_from(
    servings: &[(String, f64)],
    by_name: &HashMap<&str, &Recipe>,
    pantry: &[String],
) -> ShoppingList {
    let mut lists: Vec<(Vec<&ParsedIngredient>, f64)> = Vec::new();

    for (name, total) in servings {
        let Some(recipe) = by_name.get(name.as_str()) else {
            warn!(recipe = %name, "Recipe file not found, left off the shopping list");
            continue;
        };
        if recipe.parsed_ingredients.is_empty() {
            warn!(recipe = %name, "No parsed ingredients, left off the shopping list");
            continue;
        }
        let base = recipe.servings.filter(|s| *s > 0).unwrap_or(1) as f64;
        let items = recipe
            .parsed_ingredients
            .iter()
            .flat_map(|section| section.items.iter())
            .collect();
        lists.push((items, total / base));
    }
    aggregate_ingredients(&lists, pantry)
}

/// A practical quantity: a common fraction when one is within 0.1,
/// otherwise one decimal. Zero renders empty.
pub fn format_qty(qty: f64) -> String {
    const COMMON: [(f64, &str); 5] = [(0.25, "1/4"), (0.33, "1/3"), (0.5, "1/2"), (0.67, "2/3"), (0.75, "3/4")];
    if qty == 0.0 {
        return String::new();
    }
    let whole = qty.trunc();
    let frac = qty - whole;
    if frac > 0.0 {
        let closest = COMMON
            .iter()
            .min_by(|a, b| (a.0 - frac).abs().total_cmp(&(b.0 - frac).abs()));
        if let Some((value, label)) = closest {
            if (value - frac).abs() < 0.1 {
                return if whole > 0.0 {
                    format!("{} {}", whole as i64, label)
                } else {
                    label.to_string()
                };
            }
        }
    }
    if whole == qty {
        return (whole as i64).to_string();
    }
    format!("{:.1}", qty)
}

/// Markdown checklist, one `##` heading per section.
pub fn format_shopping_markdown(list: &ShoppingList) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Shopping List");
    let _ = writeln!(out);
    for (section, items) in list.sections() {
        let _ = writeln!(out, "## {}", section);
        let _ = writeln!(out);
        for entry in items {
            let qty = if entry.qty > 0.0 { format_qty(entry.qty) } else { String::new() };
            let unit = if entry.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", entry.unit)
            };
            let notes = if entry.notes.is_empty() {
                String::new()
            } else {
                format!(" ({})", entry.notes.join(", "))
            };
            if qty.is_empty() {
                let _ = writeln!(out, "- [ ] {}{}", entry.item, notes);
            } else {
                let _ = writeln!(out, "- [ ] {}{} {}{}", qty, unit, entry.item, notes);
            }
        }
        let _ = writeln!(out);
    }
    out
}

pub fn format_shopping_json(list: &ShoppingList) -> Result<String> {
    serde_json::to_string_pretty(list).context("Failed to serialize shopping list")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{day_name, IngredientSection, MealSlot, MealType, PrepStyle};

    fn ingredient(qty: Option<f64>, unit: Option<&str>, item: &str, notes: Option<&str>) -> ParsedIngredient {
        ParsedIngredient {
            qty,
            unit: unit.map(|u| u.to_string()),
            item: item.to_string(),
            notes: notes.map(|n| n.to_string()),
        }
    }

    fn recipe(name: &str, servings: Option<u32>, items: Vec<ParsedIngredient>) -> Recipe {
        let mut r = Recipe::new(name);
        r.servings = servings;
        r.parsed_ingredients = vec![IngredientSection { section: None, items }];
        r
    }

    fn corpus() -> Vec<Recipe> {
        vec![
            recipe(
                "Black Bean Chili",
                Some(4),
                vec![
                    ingredient(Some(2.0), Some("cans"), "Black Beans", Some("drained")),
                    ingredient(Some(1.0), Some("lb"), "ground beef", None),
                    ingredient(Some(1.0), Some("tsp"), "kosher salt", None),
                ],
            ),
            recipe(
                "Bean Tacos",
                Some(2),
                vec![
                    ingredient(Some(1.0), Some("can"), "black beans", Some("rinsed")),
                    ingredient(Some(8.0), None, "corn tortillas", None),
                    ingredient(None, None, "cilantro", None),
                ],
            ),
            Recipe::new("Mystery Stew"),
        ]
    }

    #[test]
    fn test_classify_section() {
        assert_eq!(classify_section("Green Onion"), StoreSection::Produce);
        assert_eq!(classify_section("chicken thighs"), StoreSection::MeatSeafood);
        assert_eq!(classify_section("soy sauce"), StoreSection::Pantry);
        assert_eq!(classify_section("smoked paprika"), StoreSection::SpicesCondiments);
        assert_eq!(classify_section("frozen edamame"), StoreSection::Frozen);
        assert_eq!(classify_section("xanthan gum"), StoreSection::Other);
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit(Some("Tablespoons")), "Tbsp");
        assert_eq!(normalize_unit(Some("lbs.")), "lb");
        assert_eq!(normalize_unit(Some("cans")), "can");
        assert_eq!(normalize_unit(Some("pinch")), "pinch");
        assert_eq!(normalize_unit(None), "");
    }

    #[test]
    fn test_format_qty() {
        assert_eq!(format_qty(0.0), "");
        assert_eq!(format_qty(0.5), "1/2");
        assert_eq!(format_qty(1.33), "1 1/3");
        assert_eq!(format_qty(2.0), "2");
        assert_eq!(format_qty(1.1), "1.1");
    }

    #[test]
    fn test_build_shopping_list_scales_and_merges() {
        let servings = vec![
            ("Black Bean Chili".to_string(), 8.0),
            ("Bean Tacos".to_string(), 2.0),
            ("Mystery Stew".to_string(), 1.0),
            ("Not In Vault".to_string(), 1.0),
        ];
        let pantry = pantry_items(&["salt".to_string()], &[" ".to_string()]);
        let list = build_shopping_list(&servings, &corpus(), &pantry);

        let pantry_section = list.section(StoreSection::Pantry).unwrap();
        // 2 cans x2 from the chili plus 1 can from the tacos
        let beans = pantry_section.iter().find(|i| i.item == "Black Beans").unwrap();
        assert_eq!(beans.qty, 5.0);
        assert_eq!(beans.unit, "can");
        assert_eq!(beans.notes, vec!["drained", "rinsed"]);

        let beef = &list.section(StoreSection::MeatSeafood).unwrap()[0];
        assert_eq!((beef.item.as_str(), beef.qty), ("ground beef", 2.0));
        assert!(list
            .sections()
            .iter()
            .flat_map(|(_, items)| items)
            .all(|i| !i.item.contains("salt")));

        let order: Vec<StoreSection> = list.sections().iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![StoreSection::Produce, StoreSection::MeatSeafood, StoreSection::Pantry]
        );
    }

    #[test]
    fn test_saved_plan_servings_sum_per_recipe() -> Result<()> {
        let plan = SavedPlan::parse(
            r#"{"start_date": "2026-10-19", "slots": [
                {"recipe": "Black Bean Chili", "servings": 1.5},
                {"recipe": "Bean Tacos", "servings": 1.0},
                {"recipe": "Black Bean Chili", "servings": 1.0},
                {"recipe": null},
                {"recipe": "Bean Tacos"}
            ]}"#,
        )?;
        assert_eq!(
            plan.servings(),
            vec![("Black Bean Chili".to_string(), 2.5), ("Bean Tacos".to_string(), 2.0)]
        );
        Ok(())
    }

    #[test]
    fn test_markdown_and_json_output() -> Result<()> {
        let servings = vec![("Bean Tacos".to_string(), 2.0)];
        let list = build_shopping_list(&servings, &corpus(), &[]);
        let md = format_shopping_markdown(&list);
        assert!(md.starts_with("# Shopping List\n\n## Produce\n\n- [ ] cilantro\n"));
        assert!(md.contains("- [ ] 1 can black beans (rinsed)"));
        assert!(md.contains("- [ ] 8 corn tortillas"));

        let json = format_shopping_json(&list)?;
        let produce = json.find("\"Produce\"").unwrap();
        let pantry = json.find("\"Pantry\"").unwrap();
        assert!(produce < pantry);
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["Pantry"][0]["item"], "black beans");
        assert_eq!(value["Pantry"][0]["qty"], 1.0);
        Ok(())
    }

    #[test]
    fn test_plan_shopping_list_uses_planned_servings() {
        let chili = corpus().remove(0);
        let slot = |day: usize, servings: f64| MealSlot {
            day,
            day_name: day_name(day),
            date: None,
            meal_type: MealType::Dinner,
            prep_style: PrepStyle::Fresh,
            recipe: chili.clone(),
            servings,
            calories: 0.0,
            protein_g: 0.0,
            pinned: false,
        };
        let plan = MealPlan {
            start_date: None,
            end_date: None,
            days: 2,
            calories_target: 2200,
            protein_target: 150,
            meal_targets: BTreeMap::new(),
            slots: vec![slot(0, 1.5), slot(1, 0.5)],
        };

        let list = plan_shopping_list(&plan, &["black beans".to_string()]);
        assert!(list.section(StoreSection::Pantry).is_none());
        let beef = &list.section(StoreSection::MeatSeafood).unwrap()[0];
        assert_eq!((beef.item.as_str(), beef.qty, beef.unit.as_str()), ("ground beef", 0.5, "lb"));
    }
}
