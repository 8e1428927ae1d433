use crate::models::Recipe;
use std::collections::HashMap;

/// Canonical group for a main-ingredient label, e.g. "Chicken Thighs" -> "poultry".
pub fn normalize_ingredient_group(main_ingredient: Option<&str>) -> Option<&'static str> {
    let key = main_ingredient?.trim().to_lowercase();
    let group = match key.as_str() {
        "chicken" | "turkey" | "chicken breast" | "chicken thigh" | "chicken thighs"
        | "chicken drumsticks" | "chicken wings" | "ground turkey" | "ground chicken" => "poultry",
        "beef" | "ground beef" | "steak" | "beef stew meat" | "corned beef" => "beef",
        "pork" | "pork chops" | "pork loin" | "ground pork" | "ham" | "bacon" | "sausage"
        | "chorizo" | "bratwurst" => "pork",
        "salmon" | "shrimp" | "fish" | "tilapia" | "tuna" | "crab" | "cod" => "seafood",
        "beans" | "black beans" | "chickpeas" | "lentils" | "kidney beans" | "pinto beans"
        | "white beans" | "black-eyed peas" => "legumes",
        "tofu" | "tempeh" => "tofu",
        "pasta" | "spaghetti" | "rigatoni" | "penne" | "ravioli" | "tortellini" | "gnocchi"
        | "noodles" => "pasta",
        "rice" | "quinoa" | "barley" | "farro" | "oats" => "grains",
        "eggs" | "egg" => "eggs",
        _ => return None,
    };
    Some(group)
}

/// Dense group ids for a candidate list.
///
/// Recipes in a named group share `group:<name>`; unmapped ingredients share
/// `raw:<ingredient>`; recipes without a main ingredient each get a fresh
/// `none:<id>` and never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTable {
    pub group_ids: Vec<usize>,
    pub num_groups: usize,
    pub key_to_id: HashMap<String, usize>,
}

impl GroupTable {
    pub fn build(candidates: &[&Recipe]) -> Self {
        let mut key_to_id: HashMap<String, usize> = HashMap::new();
        let mut group_ids = Vec::with_capacity(candidates.len());

        for recipe in candidates {
            let next_id = key_to_id.len();
            // blank labels count as missing
            let main = recipe
                .main_ingredient
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty());
            let key = match (normalize_ingredient_group(main), main) {
                (Some(group), _) => format!("group:{}", group),
                (None, Some(raw)) => format!("raw:{}", raw.to_lowercase()),
                (None, None) => format!("none:{}", next_id),
            };
            let id = *key_to_id.entry(key).or_insert(next_id);
            group_ids.push(id);
        }

        Self {
            num_groups: key_to_id.len(),
            group_ids,
            key_to_id,
        }
    }

    /// Id of a canonical group name ("beef"), if any candidate belongs to it.
    pub fn named_group_id(&self, group: &str) -> Option<usize> {
        self.key_to_id
            .get(&format!("group:{}", group.trim().to_lowercase()))
            .copied()
    }
}
