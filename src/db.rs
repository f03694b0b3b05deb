//! Recipe catalog schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::calculator::RecipeDatabase;
use crate::models::{Item, Recipe, RecipeComponent, Role};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Every item referenced by a recipe, keyed by "name (source)"
        CREATE TABLE IF NOT EXISTS items (
            key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source TEXT NOT NULL
        );

        -- One row per distinct recipe, keyed by its rendered text
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE
        );

        -- Reactants and products, position keeps registration order per side
        CREATE TABLE IF NOT EXISTS recipe_components (
            recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_key TEXT NOT NULL REFERENCES items(key),
            quantity REAL NOT NULL,
            probabilistic INTEGER NOT NULL DEFAULT 0,
            consumed INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (recipe_id, role, position)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_components_item ON recipe_components(item_key, role);
        "#,
    )?;
    Ok(())
}

/// Insert an item, keeping an existing row with the same key
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO items (key, name, source) VALUES (?1, ?2, ?3)",
        (item.key(), item.name(), item.source()),
    )?;
    Ok(())
}

/// Store a recipe with its components.
///
/// Returns the new recipe id, or `None` if a recipe with the same key is
/// already in the catalog.
pub fn insert_recipe(conn: &Connection, recipe: &Recipe) -> Result<Option<i64>> {
    let key = recipe.key();
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM recipes WHERE key = ?1", [&key], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        debug!(recipe = %key, "recipe already in catalog");
        return Ok(None);
    }

    conn.execute("INSERT INTO recipes (key) VALUES (?1)", [&key])?;
    let recipe_id = conn.last_insert_rowid();

    let sides = [
        (Role::Reactant, recipe.reactants()),
        (Role::Product, recipe.products()),
    ];
    for (role, components) in sides {
        for (position, component) in components.iter().enumerate() {
            upsert_item(conn, component.item())?;
            conn.execute(
                "INSERT INTO recipe_components
                    (recipe_id, role, position, item_key, quantity, probabilistic, consumed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    recipe_id,
                    role.as_str(),
                    position as i64,
                    component.item().key(),
                    component.quantity(),
                    component.is_probabilistic(),
                    component.is_consumed(),
                ),
            )?;
        }
    }

    Ok(Some(recipe_id))
}

/// Clear all recipes and items
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_components;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Rebuild one recipe from its component rows
pub fn get_recipe(conn: &Connection, recipe_id: i64) -> Result<Recipe> {
    let mut stmt = conn.prepare(
        "SELECT i.name, i.source, rc.quantity, rc.role, rc.probabilistic, rc.consumed
         FROM recipe_components rc
         JOIN items i ON i.key = rc.item_key
         WHERE rc.recipe_id = ?1
         ORDER BY rc.role = 'product', rc.position",
    )?;

    let rows = stmt.query_map([recipe_id], |row| {
        Ok((
            Item::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut recipe = Recipe::new();
    for row in rows {
        let (item, quantity, role, probabilistic, consumed) = row?;
        let mut component = RecipeComponent::from_role_name(item, quantity, &role)
            .with_context(|| format!("corrupt component row in recipe {}", recipe_id))?;
        if probabilistic {
            component = component.probabilistic()?;
        }
        if !consumed {
            component = component.not_consumed()?;
        }
        recipe.register_component(component);
    }
    Ok(recipe)
}

/// List every recipe in insertion order
pub fn list_recipes(conn: &Connection) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare("SELECT id FROM recipes ORDER BY id")?;
    let ids = stmt.query_map([], |row| row.get::<_, i64>(0))?;

    let mut results = Vec::new();
    for id in ids {
        results.push(get_recipe(conn, id?)?);
    }
    Ok(results)
}

/// Get the first recipe stored that produces the given item
pub fn get_producer(conn: &Connection, item_key: &str) -> Result<Option<Recipe>> {
    let recipe_id: Option<i64> = conn
        .query_row(
            "SELECT recipe_id FROM recipe_components
             WHERE item_key = ?1 AND role = 'product' AND quantity > 0
             ORDER BY recipe_id
             LIMIT 1",
            [item_key],
            |row| row.get(0),
        )
        .optional()?;

    recipe_id.map(|id| get_recipe(conn, id)).transpose()
}

/// List all unique item keys that some recipe produces
pub fn list_producible_items(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT item_key FROM recipe_components
         WHERE role = 'product' AND quantity > 0
         ORDER BY item_key",
    )?;

    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Build an in-memory lookup of every stored recipe by product item key.
///
/// Where several recipes produce the same item the oldest one wins.
pub fn load_recipe_database(conn: &Connection) -> Result<RecipeDatabase> {
    let mut database = RecipeDatabase::new();
    for recipe in list_recipes(conn)? {
        database.register_recipe(recipe);
    }
    debug!(items = database.len(), "loaded recipe database");
    Ok(database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Job;
    use crate::parser::parse_recipe;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_read_back() {
        let conn = catalog();
        let recipe = parse_recipe(
            "1 Cobblestone (Minecraft) + 1 (nc) Pulverizer (Thermal Foundation) \
             = 1 Gravel (Minecraft) + 0.1 (p) Sand (Minecraft)",
        )
        .unwrap();

        let id = insert_recipe(&conn, &recipe).unwrap().unwrap();
        let stored = get_recipe(&conn, id).unwrap();
        assert_eq!(stored, recipe);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let conn = catalog();
        let recipe = parse_recipe("2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)").unwrap();

        assert!(insert_recipe(&conn, &recipe).unwrap().is_some());
        assert!(insert_recipe(&conn, &recipe).unwrap().is_none());
        assert_eq!(list_recipes(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_get_producer() {
        let conn = catalog();
        let planks = parse_recipe("1 Oak Wood (Minecraft) = 4 Oak Planks (Minecraft)").unwrap();
        insert_recipe(&conn, &planks).unwrap();
        insert_recipe(&conn, &parse_recipe("1 Oak Log (Minecraft) = 4 Oak Planks (Minecraft)").unwrap())
            .unwrap();

        let producer = get_producer(&conn, "Oak Planks (Minecraft)").unwrap().unwrap();
        assert_eq!(producer, planks);
        assert!(get_producer(&conn, "Oak Wood (Minecraft)").unwrap().is_none());
    }

    #[test]
    fn test_list_producible_items() {
        let conn = catalog();
        insert_recipe(&conn, &parse_recipe("2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)").unwrap())
            .unwrap();
        insert_recipe(&conn, &parse_recipe("1 Oak Wood (Minecraft) = 4 Oak Planks (Minecraft)").unwrap())
            .unwrap();

        assert_eq!(
            list_producible_items(&conn).unwrap(),
            vec!["Oak Planks (Minecraft)".to_string(), "Sticks (Minecraft)".to_string()]
        );
    }

    #[test]
    fn test_load_recipe_database_and_clear() {
        let conn = catalog();
        insert_recipe(&conn, &parse_recipe("2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)").unwrap())
            .unwrap();

        let database = load_recipe_database(&conn).unwrap();
        assert!(database.contains("Sticks (Minecraft)"));
        assert!(!database.contains("Oak Planks (Minecraft)"));

        clear_catalog(&conn).unwrap();
        assert!(load_recipe_database(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_zero_quantity_product_does_not_shadow_producer() {
        let conn = catalog();
        for line in [
            "1 Ore (Minecraft) = 1 Ingot (Minecraft) + 0 Slag (Minecraft) + 0 Dust (Minecraft)",
            "2 Rock (Minecraft) = 1 Slag (Minecraft)",
            "1 Slag (Minecraft) = 1 Brick (Minecraft)",
        ] {
            insert_recipe(&conn, &parse_recipe(line).unwrap()).unwrap();
        }

        let producible = list_producible_items(&conn).unwrap();
        assert!(!producible.contains(&"Dust (Minecraft)".to_string()));

        let database = load_recipe_database(&conn).unwrap();
        assert!(!database.contains("Dust (Minecraft)"));
        let slag = database.get("Slag (Minecraft)").unwrap();
        assert_eq!(slag.key(), "2 Rock (Minecraft) = 1 Slag (Minecraft)");

        let brick = get_producer(&conn, "Brick (Minecraft)").unwrap().unwrap();
        let mut job = Job::new(Item::new("Brick", "Minecraft"), 1.0, brick).unwrap();
        job.register_recipe_database(&database);
        job.calculate_bill_of_materials().unwrap();
        assert_eq!(job.materials_text(), "2 Rock (Minecraft)");
    }

    #[test]
    fn test_corrupt_role_is_reported() {
        let conn = catalog();
        let recipe = parse_recipe("1 Coal (Minecraft) = 1 Torch (Minecraft)").unwrap();
        let id = insert_recipe(&conn, &recipe).unwrap().unwrap();
        conn.execute(
            "UPDATE recipe_components SET role = 'catalyst' WHERE recipe_id = ?1 AND role = 'reactant'",
            [id],
        )
        .unwrap();

        let err = get_recipe(&conn, id).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid component role 'catalyst'"));
    }
}
