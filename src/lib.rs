//! Recipe bill-of-materials calculator
//!
//! Given a recipe for a desired item and a lookup of which recipe produces
//! which item, works out how much of each raw material a target quantity
//! needs.

pub mod calculator;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod parser;

pub use calculator::{Job, JobSummary, Materials, RecipeDatabase, DEFAULT_MAX_PASSES};
pub use error::{CalcError, Result};
pub use models::{Item, Recipe, RecipeComponent, Role};
