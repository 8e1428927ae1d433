pub mod assembler;
pub mod groups;
pub mod model;
pub mod pins;
pub mod planner;
pub mod pools;
pub mod solver;
pub mod targets;

// Re-export the entry points the CLI and integration tests use
pub use model::{SolveStatus, Solver};
pub use pins::{parse_pin, PinSpec};
pub use planner::{build_meal_plan, PlanOutcome};
pub use pools::{filter_recipes, RecipeFilter};
pub use solver::SearchSolver;
