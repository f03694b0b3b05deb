//! Text parsing for items, components and recipes
//!
//! Accepts the same forms the models render:
//!
//! - item: `Oak Planks (Minecraft)`, or `Oak Planks` for the default source
//! - component: `0.1 (p) Sand (Minecraft)`, `1 (nc) Pulverizer (Thermal Foundation)`
//! - recipe: `2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)`
//!
//! Components on one side of a recipe are separated by ` + ` (spaces required,
//! so item names may contain a bare `+`).

use regex::Regex;
use tracing::debug;

use crate::error::{CalcError, Result};
use crate::models::{Item, Recipe, RecipeComponent, Role, UNKNOWN_SOURCE};

#[derive(Debug, Clone)]
pub struct RecipeParser {
    component_re: Regex,
    item_re: Regex,
    separator_re: Regex,
    default_source: String,
}

impl RecipeParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            component_re: Regex::new(
                r"^(?P<qty>\d+(?:\.\d*)?(?:[eE][-+]?\d+)?|\.\d+(?:[eE][-+]?\d+)?)(?P<p>\s+\(p\))?(?P<nc>\s+\(nc\))?\s+(?P<item>\S.*)$",
            )?,
            item_re: Regex::new(r"^(?P<name>.*?\S)\s*\((?P<source>[^()]*[^()\s][^()]*)\)$")?,
            separator_re: Regex::new(r"\s+\+\s+")?,
            default_source: UNKNOWN_SOURCE.to_string(),
        })
    }

    /// Source used for items written without a `(source)` suffix
    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = source.into();
        self
    }

    pub fn set_default_source(&mut self, source: impl Into<String>) {
        self.default_source = source.into();
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn parse_item(&self, input: &str) -> Result<Item> {
        let text = input.trim();
        if let Some(cap) = self.item_re.captures(text) {
            return Ok(Item::new(&cap["name"], cap["source"].trim()));
        }
        if text.is_empty() || text.contains(['(', ')']) {
            return Err(CalcError::parse(input, "expected 'name (source)' or 'name'"));
        }
        Ok(Item::new(text, self.default_source.as_str()))
    }

    pub fn parse_component(&self, input: &str, role: Role) -> Result<RecipeComponent> {
        let text = input.trim();
        let cap = self
            .component_re
            .captures(text)
            .ok_or_else(|| CalcError::parse(input, "expected 'quantity [(p)] [(nc)] item'"))?;

        let quantity: f64 = cap["qty"]
            .parse()
            .map_err(|_| CalcError::parse(input, "quantity is not a number"))?;
        let item = self.parse_item(&cap["item"])?;

        let mut component = RecipeComponent::new(item, quantity, role)?;
        if cap.name("p").is_some() {
            component = component.probabilistic()?;
        }
        if cap.name("nc").is_some() {
            component = component.not_consumed()?;
        }
        Ok(component)
    }

    pub fn parse_recipe(&self, input: &str) -> Result<Recipe> {
        let (reactants, products) = input
            .split_once('=')
            .ok_or_else(|| CalcError::parse(input, "missing '=' between reactants and products"))?;
        if products.contains('=') {
            return Err(CalcError::parse(input, "more than one '='"));
        }

        let mut recipe = Recipe::new();
        for (side, role) in [(reactants, Role::Reactant), (products, Role::Product)] {
            let side = side.trim();
            if side.is_empty() {
                return Err(CalcError::parse(input, format!("no {}s", role)));
            }
            for part in self.separator_re.split(side) {
                let component = self.parse_component(part, role)?;
                let key = component.key();
                if !recipe.register_component(component) {
                    debug!(component = %key, "duplicate component dropped");
                }
            }
        }
        Ok(recipe)
    }
}

pub fn parse_item(input: &str) -> Result<Item> {
    RecipeParser::new()?.parse_item(input)
}

pub fn parse_recipe(input: &str) -> Result<Recipe> {
    RecipeParser::new()?.parse_recipe(input)
}
