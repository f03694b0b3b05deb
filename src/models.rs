//! Data models for items, recipe components and recipes

use std::fmt;
use std::str::FromStr;

use crate::error::{CalcError, Result};

/// Source recorded for items created without one
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Something that can be held in an inventory, whether crafted or gathered.
///
/// The source distinguishes items with the same name from different catalogs
/// (games, mods). Two items are the same entity iff their [`Item::key`] matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    name: String,
    source: String,
}

impl Item {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn unsourced(name: impl Into<String>) -> Self {
        Self::new(name, UNKNOWN_SOURCE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Identity key, `"{name} ({source})"`
    pub fn key(&self) -> String {
        format!("{} ({})", self.name, self.source)
    }

    pub fn info(&self) -> String {
        format!("Item name: {}\nItem source: {}", self.name, self.source)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.source)
    }
}

/// Whether a component is consumed by a recipe or created by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reactant,
    Product,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reactant => "reactant",
            Role::Product => "product",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Role::Reactant => "Reactant",
            Role::Product => "Product",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reactant" => Ok(Role::Reactant),
            "product" => Ok(Role::Product),
            _ => Err(CalcError::InvalidRole(s.to_string())),
        }
    }
}

/// An item paired with a quantity, on one side of a recipe.
///
/// Quantities are real numbers: a probabilistic product carries its expected
/// yield, and fuel can be consumed in fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeComponent {
    item: Item,
    quantity: f64,
    role: Role,
    probabilistic: bool,
    consumed: bool,
}

impl RecipeComponent {
    pub fn new(item: Item, quantity: f64, role: Role) -> Result<Self> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(CalcError::InvalidQuantity { quantity });
        }
        Ok(Self {
            item,
            quantity,
            role,
            probabilistic: false,
            consumed: true,
        })
    }

    pub fn reactant(item: Item, quantity: f64) -> Result<Self> {
        Self::new(item, quantity, Role::Reactant)
    }

    pub fn product(item: Item, quantity: f64) -> Result<Self> {
        Self::new(item, quantity, Role::Product)
    }

    /// Build a component from a textual role name such as `"reactant"`
    pub fn from_role_name(item: Item, quantity: f64, role: &str) -> Result<Self> {
        Self::new(item, quantity, role.parse()?)
    }

    /// Mark a product as a chance-based yield; `quantity` is then the expected value
    pub fn probabilistic(mut self) -> Result<Self> {
        if self.role != Role::Product {
            return Err(CalcError::InvalidRoleModifier {
                modifier: "probabilistic",
                role: self.role,
            });
        }
        self.probabilistic = true;
        Ok(self)
    }

    /// Mark a reactant as a tool or catalyst the recipe does not use up
    pub fn not_consumed(mut self) -> Result<Self> {
        if self.role != Role::Reactant {
            return Err(CalcError::InvalidRoleModifier {
                modifier: "not consumed",
                role: self.role,
            });
        }
        self.consumed = false;
        Ok(self)
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_probabilistic(&self) -> bool {
        self.probabilistic
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    fn markers(&self) -> &'static str {
        match (self.probabilistic, self.consumed) {
            (true, _) => " (p)",
            (false, false) => " (nc)",
            (false, true) => "",
        }
    }

    /// Quantity and display name, e.g. `"0.1 (p) Sand"`
    pub fn text(&self) -> String {
        format!("{}{} {}", self.quantity, self.markers(), self.item.name())
    }

    /// Quantity and full item identity, e.g. `"1 (nc) Pulverizer (Thermal Foundation)"`.
    ///
    /// The role is not part of the key; the owning recipe keeps reactants and
    /// products apart.
    pub fn key(&self) -> String {
        format!("{}{} {}", self.quantity, self.markers(), self.item.key())
    }

    pub fn info(&self) -> String {
        format!("{}: {}", self.role.title(), self.text())
    }
}

/// A fixed conversion from a set of reactants to a set of products
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipe {
    reactants: Vec<RecipeComponent>,
    products: Vec<RecipeComponent>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component to the side matching its role.
    ///
    /// A component whose key is already registered on that side is dropped,
    /// not merged. Returns whether the component was inserted.
    pub fn register_component(&mut self, component: RecipeComponent) -> bool {
        let side = match component.role() {
            Role::Reactant => &mut self.reactants,
            Role::Product => &mut self.products,
        };
        let key = component.key();
        if side.iter().any(|c| c.key() == key) {
            return false;
        }
        side.push(component);
        true
    }

    pub fn reactants(&self) -> &[RecipeComponent] {
        &self.reactants
    }

    pub fn products(&self) -> &[RecipeComponent] {
        &self.products
    }

    /// Look up a reactant by component key
    pub fn reactant(&self, key: &str) -> Option<&RecipeComponent> {
        self.reactants.iter().find(|c| c.key() == key)
    }

    /// Look up a product by component key
    pub fn product(&self, key: &str) -> Option<&RecipeComponent> {
        self.products.iter().find(|c| c.key() == key)
    }

    /// First product whose item identity key equals `item_key`
    pub fn product_for(&self, item_key: &str) -> Option<&RecipeComponent> {
        self.products.iter().find(|c| c.item().key() == item_key)
    }

    pub fn is_valid(&self) -> bool {
        !self.reactants.is_empty() && !self.products.is_empty()
    }

    /// `"{reactant} + ... = {product} + ..."`, each side in registration order
    pub fn key(&self) -> String {
        format!(
            "{} = {}",
            join_keys(&self.reactants),
            join_keys(&self.products)
        )
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn join_keys(components: &[RecipeComponent]) -> String {
    components
        .iter()
        .map(RecipeComponent::key)
        .collect::<Vec<_>>()
        .join(" + ")
}
