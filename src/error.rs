//! Error types for the recipe engine

use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error)]
pub enum CalcError {
    #[error("invalid component role '{0}' (expected 'reactant' or 'product')")]
    InvalidRole(String),

    #[error("modifier '{modifier}' is not allowed on a {role}")]
    InvalidRoleModifier { modifier: &'static str, role: Role },

    #[error("quantity {quantity} must be a finite, non-negative number")]
    InvalidQuantity { quantity: f64 },

    #[error("target quantity {quantity} must be a finite number greater than zero")]
    InvalidTargetQuantity { quantity: f64 },

    #[error("recipe '{recipe}' needs at least one reactant and one product")]
    InvalidRecipe { recipe: String },

    #[error("recipe '{recipe}' has no single product matching '{item}'")]
    DesiredProductNotFound { item: String, recipe: String },

    #[error("recipe database maps '{item}' to '{recipe}', which does not produce it")]
    RecipeDatabaseInconsistent { item: String, recipe: String },

    #[error("no fixed point after {passes} expansion passes - recipe graph has a cycle")]
    CyclicRecipeGraph { passes: usize },

    #[error("cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("invalid parser pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl CalcError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        CalcError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;
