//! Bill-of-materials expansion
//!
//! A [`Job`] starts from the reactants of one top-level recipe, scaled to the
//! target quantity, and then keeps replacing every material that has a known
//! producing recipe with that recipe's reactants until nothing changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{CalcError, Result};
use crate::models::{Item, Recipe, RecipeComponent};

/// Upper bound on expansion passes before a Job gives up on a cyclic graph
pub const DEFAULT_MAX_PASSES: usize = 1000;

/// Lookup from an item identity key to the recipe that produces it.
///
/// Holds at most one recipe per item key.
#[derive(Debug, Clone, Default)]
pub struct RecipeDatabase {
    recipes: HashMap<String, Arc<Recipe>>,
}

impl RecipeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `item_key` to `recipe`, replacing any previous entry.
    ///
    /// No check is made that `recipe` produces the item; a mismatch surfaces
    /// as [`CalcError::RecipeDatabaseInconsistent`] during expansion.
    pub fn insert(
        &mut self,
        item_key: impl Into<String>,
        recipe: impl Into<Arc<Recipe>>,
    ) -> Option<Arc<Recipe>> {
        self.recipes.insert(item_key.into(), recipe.into())
    }

    /// Index `recipe` under the item key of each of its products.
    ///
    /// Products with a zero quantity do not produce their item and are not
    /// indexed. Keys that already have a producer keep it. Returns how many
    /// keys now point at this recipe.
    pub fn register_recipe(&mut self, recipe: impl Into<Arc<Recipe>>) -> usize {
        let recipe = recipe.into();
        let mut indexed = 0;
        for product in recipe.products().iter().filter(|p| p.quantity() > 0.0) {
            let item_key = product.item().key();
            if let Some(existing) = self.recipes.get(&item_key) {
                if !Arc::ptr_eq(existing, &recipe) {
                    warn!(
                        item = %item_key,
                        kept = %existing,
                        ignored = %recipe,
                        "item already has a producing recipe"
                    );
                }
                continue;
            }
            self.recipes.insert(item_key, Arc::clone(&recipe));
            indexed += 1;
        }
        indexed
    }

    pub fn get(&self, item_key: &str) -> Option<&Recipe> {
        self.recipes.get(item_key).map(Arc::as_ref)
    }

    pub fn contains(&self, item_key: &str) -> bool {
        self.recipes.contains_key(item_key)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// Item key to accumulated quantity, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materials {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl Materials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_key: &str) -> Option<f64> {
        self.index.get(item_key).map(|&i| self.entries[i].1)
    }

    /// Set the quantity for `item_key`, overwriting any previous value
    pub fn set(&mut self, item_key: impl Into<String>, quantity: f64) {
        let item_key = item_key.into();
        match self.index.get(&item_key) {
            Some(&i) => self.entries[i].1 = quantity,
            None => self.push(item_key, quantity),
        }
    }

    /// Add `quantity` to whatever is already accumulated for `item_key`
    pub fn add(&mut self, item_key: impl Into<String>, quantity: f64) {
        let item_key = item_key.into();
        match self.index.get(&item_key) {
            Some(&i) => self.entries[i].1 += quantity,
            None => self.push(item_key, quantity),
        }
    }

    fn push(&mut self, item_key: String, quantity: f64) {
        self.index.insert(item_key.clone(), self.entries.len());
        self.entries.push((item_key, quantity));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, qty)| (key.as_str(), *qty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `"{quantity} {item key}"` entries joined with `" + "`.
/// Whole quantities render without a decimal point.
impl fmt::Display for Materials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, qty)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{} {}", qty, key)?;
        }
        Ok(())
    }
}

/// A request for a target quantity of one item via a given top-level recipe.
///
/// Single use: construct it, optionally attach a [`RecipeDatabase`], then call
/// [`Job::calculate_bill_of_materials`]. The database is borrowed, never owned.
#[derive(Debug)]
pub struct Job<'db> {
    desired_item: Item,
    target_quantity: f64,
    recipe: Recipe,
    materials: Materials,
    recipe_database: Option<&'db RecipeDatabase>,
    max_passes: usize,
    passes: usize,
}

impl<'db> Job<'db> {
    /// Validate the inputs and seed the materials from the recipe's reactants
    pub fn new(desired_item: Item, target_quantity: f64, recipe: Recipe) -> Result<Self> {
        if !target_quantity.is_finite() || target_quantity <= 0.0 {
            return Err(CalcError::InvalidTargetQuantity {
                quantity: target_quantity,
            });
        }
        if !recipe.is_valid() {
            return Err(CalcError::InvalidRecipe {
                recipe: recipe.key(),
            });
        }

        let mut job = Self {
            desired_item,
            target_quantity,
            recipe,
            materials: Materials::new(),
            recipe_database: None,
            max_passes: DEFAULT_MAX_PASSES,
            passes: 0,
        };
        job.initialize_materials()?;
        Ok(job)
    }

    /// Allow up to `max_passes` substituting passes; the pass that confirms
    /// the fixed point is not counted against the limit
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Reset the materials to the top-level recipe's reactants, scaled by the
    /// number of recipe runs needed for the target quantity
    pub fn initialize_materials(&mut self) -> Result<()> {
        let desired_key = self.desired_item.key();
        let product = single_product(&self.recipe, &desired_key).ok_or_else(|| {
            CalcError::DesiredProductNotFound {
                item: desired_key.clone(),
                recipe: self.recipe.key(),
            }
        })?;

        let runs = self.target_quantity / product.quantity();
        debug!(item = %desired_key, runs, "seeding materials from top-level recipe");

        let mut materials = Materials::new();
        for reactant in self.recipe.reactants() {
            materials.set(reactant.item().key(), reactant.quantity() * runs);
        }
        self.materials = materials;
        self.passes = 0;
        Ok(())
    }

    pub fn register_recipe_database(&mut self, recipe_database: &'db RecipeDatabase) {
        self.recipe_database = Some(recipe_database);
    }

    /// Expand materials until every remaining one has no producing recipe
    pub fn calculate_bill_of_materials(&mut self) -> Result<()> {
        self.calculate_bill_of_materials_with(|_, _| {})
    }

    /// Like [`Job::calculate_bill_of_materials`], calling `observer` with the
    /// pass number (from 1) and the materials after every pass
    pub fn calculate_bill_of_materials_with<F>(&mut self, mut observer: F) -> Result<()>
    where
        F: FnMut(usize, &Materials),
    {
        let mut pass = 0;
        loop {
            pass += 1;
            let (next, expanded) = expand_once(&self.materials, self.recipe_database)?;
            self.materials = next;
            self.passes += 1;

            debug!(pass, materials = self.materials.len(), expanded, "expansion pass");
            observer(pass, &self.materials);

            if !expanded {
                return Ok(());
            }
            if pass > self.max_passes {
                return Err(CalcError::CyclicRecipeGraph { passes: pass });
            }
        }
    }

    pub fn desired_item(&self) -> &Item {
        &self.desired_item
    }

    pub fn target_quantity(&self) -> f64 {
        self.target_quantity
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn materials(&self) -> &Materials {
        &self.materials
    }

    /// Total passes run since the materials were last seeded
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn key(&self) -> String {
        format!(
            "Job:\n\tDesired item: {}\n\tTarget quantity: {}\n\tTop-level recipe: {}",
            self.desired_item.name(),
            self.target_quantity,
            self.recipe.key()
        )
    }

    pub fn materials_text(&self) -> String {
        self.materials.to_string()
    }

    pub fn summarize(&self) -> JobSummary {
        let mut materials: Vec<(String, f64)> = self
            .materials
            .iter()
            .map(|(key, qty)| (key.to_string(), qty))
            .collect();
        materials.sort_by(|a, b| a.0.cmp(&b.0));

        JobSummary {
            desired_item: self.desired_item.key(),
            target_quantity: self.target_quantity,
            recipe: self.recipe.key(),
            passes: self.passes,
            materials,
        }
    }
}

/// The product matching `item_key`, provided exactly one with a positive
/// quantity exists
fn single_product<'r>(recipe: &'r Recipe, item_key: &str) -> Option<&'r RecipeComponent> {
    let mut matches = recipe
        .products()
        .iter()
        .filter(|p| p.item().key() == item_key && p.quantity() > 0.0);
    match (matches.next(), matches.next()) {
        (Some(product), None) => Some(product),
        _ => None,
    }
}

/// One substitution pass. Returns the new materials and whether anything was
/// substituted.
fn expand_once(
    materials: &Materials,
    recipe_database: Option<&RecipeDatabase>,
) -> Result<(Materials, bool)> {
    let mut replacement = Materials::new();
    let mut expanded = false;

    for (material_key, quantity) in materials.iter() {
        let Some(recipe) = recipe_database.and_then(|db| db.get(material_key)) else {
            replacement.add(material_key, quantity);
            continue;
        };

        let product = recipe
            .products()
            .iter()
            .find(|p| p.item().key() == material_key && p.quantity() > 0.0)
            .ok_or_else(|| CalcError::RecipeDatabaseInconsistent {
                item: material_key.to_string(),
                recipe: recipe.key(),
            })?;

        let scale = quantity / product.quantity();
        trace!(material = material_key, quantity, recipe = %recipe, "substituting");
        for reactant in recipe.reactants() {
            replacement.add(reactant.item().key(), reactant.quantity() * scale);
        }
        expanded = true;
    }

    Ok((replacement, expanded))
}

/// Report of a finished Job, raw materials sorted by key
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub desired_item: String,
    pub target_quantity: f64,
    pub recipe: String,
    pub passes: usize,
    pub materials: Vec<(String, f64)>,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bill of Materials ===")?;
        writeln!(f, "Target: {} {}", self.target_quantity, self.desired_item)?;
        writeln!(f, "Recipe: {}", self.recipe)?;
        writeln!(f, "Passes: {}", self.passes)?;
        writeln!(f)?;

        writeln!(f, "Raw materials required:")?;
        if self.materials.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (key, qty) in &self.materials {
            writeln!(f, "  {} {}", qty, key)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minecraft(name: &str) -> Item {
        Item::new(name, "Minecraft")
    }

    fn recipe(reactants: &[(&str, f64)], products: &[(&str, f64)]) -> Recipe {
        let mut recipe = Recipe::new();
        for (name, qty) in reactants {
            recipe.register_component(RecipeComponent::reactant(minecraft(name), *qty).unwrap());
        }
        for (name, qty) in products {
            recipe.register_component(RecipeComponent::product(minecraft(name), *qty).unwrap());
        }
        recipe
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("material missing");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_materials_add_and_set() {
        let mut materials = Materials::new();
        materials.add("Coal (Minecraft)", 1.5);
        materials.add("Coal (Minecraft)", 2.0);
        materials.set("Iron Ore (Minecraft)", 3.0);
        materials.set("Iron Ore (Minecraft)", 4.0);

        assert_eq!(materials.len(), 2);
        assert_eq!(materials.get("Coal (Minecraft)"), Some(3.5));
        assert_eq!(materials.get("Iron Ore (Minecraft)"), Some(4.0));
        assert_eq!(materials.to_string(), "3.5 Coal (Minecraft) + 4 Iron Ore (Minecraft)");
    }

    #[test]
    fn test_job_key() {
        let job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap();
        assert_eq!(
            job.key(),
            "Job:\n\tDesired item: Sticks\n\tTarget quantity: 16\n\tTop-level recipe: \
             2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)"
        );
    }

    #[test]
    fn test_initial_materials_are_scaled() {
        let job = Job::new(
            minecraft("Torch"),
            10.0,
            recipe(&[("Coal", 1.0), ("Sticks", 1.0)], &[("Torch", 4.0)]),
        )
        .unwrap();
        assert_close(job.materials().get("Coal (Minecraft)"), 2.5);
        assert_close(job.materials().get("Sticks (Minecraft)"), 2.5);
        assert_eq!(job.passes(), 0);
    }

    #[test]
    fn test_invalid_recipe_rejected() {
        let err = Job::new(minecraft("Sticks"), 1.0, recipe(&[], &[("Sticks", 4.0)])).unwrap_err();
        assert!(matches!(err, CalcError::InvalidRecipe { .. }));

        let err = Job::new(minecraft("Sticks"), 1.0, recipe(&[("Oak Planks", 2.0)], &[])).unwrap_err();
        assert!(matches!(err, CalcError::InvalidRecipe { .. }));
    }

    #[test]
    fn test_desired_product_not_found() {
        let err = Job::new(
            minecraft("Torch"),
            1.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CalcError::DesiredProductNotFound { item, .. } if item == "Torch (Minecraft)"
        ));
    }

    #[test]
    fn test_ambiguous_desired_product_rejected() {
        let err = Job::new(
            minecraft("Sticks"),
            1.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0), ("Sticks", 2.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, CalcError::DesiredProductNotFound { .. }));
    }

    #[test]
    fn test_invalid_target_quantity() {
        let sticks = recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]);
        for target in [0.0, -4.0, f64::INFINITY] {
            let err = Job::new(minecraft("Sticks"), target, sticks.clone()).unwrap_err();
            assert!(matches!(err, CalcError::InvalidTargetQuantity { .. }));
        }
    }

    #[test]
    fn test_single_level_without_database() {
        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap();
        job.calculate_bill_of_materials().unwrap();
        assert_eq!(job.materials_text(), "8 Oak Planks (Minecraft)");
        assert_eq!(job.passes(), 1);
    }

    #[test]
    fn test_branches_merge_into_one_total() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Planks", 4.0)]));
        db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Slab", 2.0)]));

        let mut job = Job::new(
            minecraft("Fence"),
            1.0,
            recipe(&[("Oak Planks", 4.0), ("Oak Slab", 2.0)], &[("Fence", 1.0)]),
        )
        .unwrap();
        job.register_recipe_database(&db);
        job.calculate_bill_of_materials().unwrap();

        assert_eq!(job.materials().len(), 1);
        assert_close(job.materials().get("Oak Wood (Minecraft)"), 2.0);
    }

    #[test]
    fn test_raw_material_merges_with_expanded_branch() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Coal", 1.0)], &[("Charcoal Block", 1.0)]));

        let mut job = Job::new(
            minecraft("Furnace Fuel"),
            1.0,
            recipe(&[("Coal", 2.0), ("Charcoal Block", 3.0)], &[("Furnace Fuel", 1.0)]),
        )
        .unwrap();
        job.register_recipe_database(&db);
        job.calculate_bill_of_materials().unwrap();

        assert_close(job.materials().get("Coal (Minecraft)"), 5.0);
    }

    #[test]
    fn test_expansion_is_stable_once_complete() {
        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap();
        let db = RecipeDatabase::new();
        job.register_recipe_database(&db);

        job.calculate_bill_of_materials().unwrap();
        let first = job.materials().clone();
        job.calculate_bill_of_materials().unwrap();
        assert_eq!(job.materials(), &first);
    }

    #[test]
    fn test_inconsistent_database_aborts() {
        let mut db = RecipeDatabase::new();
        db.insert("Oak Planks (Minecraft)", recipe(&[("Oak Wood", 1.0)], &[("Oak Slab", 2.0)]));

        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap();
        job.register_recipe_database(&db);

        let err = job.calculate_bill_of_materials().unwrap_err();
        assert!(matches!(
            err,
            CalcError::RecipeDatabaseInconsistent { item, .. } if item == "Oak Planks (Minecraft)"
        ));
    }

    #[test]
    fn test_cycle_stops_at_pass_limit() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Ice", 1.0)], &[("Water", 1.0)]));
        db.register_recipe(recipe(&[("Water", 1.0)], &[("Ice", 1.0)]));

        let mut job = Job::new(
            minecraft("Snow"),
            1.0,
            recipe(&[("Water", 1.0)], &[("Snow", 1.0)]),
        )
        .unwrap()
        .with_max_passes(25);
        job.register_recipe_database(&db);

        let err = job.calculate_bill_of_materials().unwrap_err();
        assert!(matches!(err, CalcError::CyclicRecipeGraph { passes: 26 }));
        assert_eq!(job.materials().len(), 1);
    }

    #[test]
    fn test_observer_sees_every_pass() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Planks", 4.0)]));

        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap();
        job.register_recipe_database(&db);

        let mut seen = Vec::new();
        job.calculate_bill_of_materials_with(|pass, materials| {
            seen.push((pass, materials.to_string()));
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (1, "2 Oak Wood (Minecraft)".to_string()),
                (2, "2 Oak Wood (Minecraft)".to_string()),
            ]
        );
    }

    #[test]
    fn test_register_recipe_keeps_first_producer() {
        let mut db = RecipeDatabase::new();
        assert_eq!(db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Planks", 4.0)])), 1);
        assert_eq!(db.register_recipe(recipe(&[("Oak Log", 1.0)], &[("Oak Planks", 4.0)])), 0);

        let producer = db.get("Oak Planks (Minecraft)").unwrap();
        assert_eq!(producer.key(), "1 Oak Wood (Minecraft) = 4 Oak Planks (Minecraft)");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_register_recipe_indexes_every_product() {
        let mut db = RecipeDatabase::new();
        let indexed = db.register_recipe(recipe(
            &[("Water", 1.0)],
            &[("Oxygen", 0.888), ("Hydrogen", 0.112)],
        ));
        assert_eq!(indexed, 2);
        assert!(db.contains("Oxygen (Minecraft)"));
        assert!(db.contains("Hydrogen (Minecraft)"));
    }

    #[test]
    fn test_register_recipe_skips_zero_quantity_products() {
        let mut db = RecipeDatabase::new();
        let indexed = db.register_recipe(recipe(&[("Ore", 1.0)], &[("Ingot", 1.0), ("Slag", 0.0)]));
        assert_eq!(indexed, 1);
        assert!(!db.contains("Slag (Minecraft)"));

        db.register_recipe(recipe(&[("Rock", 2.0)], &[("Slag", 1.0)]));
        db.register_recipe(recipe(&[("Slag", 1.0)], &[("Brick", 1.0)]));

        let mut job = Job::new(
            minecraft("Wall"),
            1.0,
            recipe(&[("Brick", 1.0)], &[("Wall", 1.0)]),
        )
        .unwrap();
        job.register_recipe_database(&db);
        job.calculate_bill_of_materials().unwrap();

        assert_eq!(job.materials_text(), "2 Rock (Minecraft)");
    }

    #[test]
    fn test_chain_as_deep_as_pass_limit_completes() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Planks", 4.0)]));
        db.register_recipe(recipe(&[("Oak Log", 1.0)], &[("Oak Wood", 1.0)]));

        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap()
        .with_max_passes(2);
        job.register_recipe_database(&db);
        job.calculate_bill_of_materials().unwrap();

        assert_eq!(job.materials_text(), "2 Oak Log (Minecraft)");
        assert_eq!(job.passes(), 3);
    }

    #[test]
    fn test_single_expansion_with_one_pass_limit() {
        let mut db = RecipeDatabase::new();
        db.register_recipe(recipe(&[("Oak Wood", 1.0)], &[("Oak Planks", 4.0)]));

        let mut job = Job::new(
            minecraft("Sticks"),
            16.0,
            recipe(&[("Oak Planks", 2.0)], &[("Sticks", 4.0)]),
        )
        .unwrap()
        .with_max_passes(1);
        job.register_recipe_database(&db);
        job.calculate_bill_of_materials().unwrap();

        assert_eq!(job.materials_text(), "2 Oak Wood (Minecraft)");
    }

    #[test]
    fn test_summary_sorted_by_key() {
        let mut job = Job::new(
            minecraft("Torch"),
            4.0,
            recipe(&[("Sticks", 1.0), ("Coal", 1.0)], &[("Torch", 4.0)]),
        )
        .unwrap();
        job.calculate_bill_of_materials().unwrap();

        let summary = job.summarize();
        assert_eq!(summary.passes, 1);
        assert_eq!(
            summary.materials,
            vec![
                ("Coal (Minecraft)".to_string(), 1.0),
                ("Sticks (Minecraft)".to_string(), 1.0),
            ]
        );
        let text = summary.to_string();
        assert!(text.contains("Target: 4 Torch (Minecraft)"));
        assert!(text.contains("  1 Coal (Minecraft)\n"));
    }
}
