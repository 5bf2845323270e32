//! Recipe data model
//!
//! Fields are public so the reply parser can fill them in. [`Recipe::new`]
//! and [`crate::parse::parse_recipe`] both run [`Recipe::validate`] before
//! handing a recipe out, so a recipe from either has at least one ingredient
//! and one instruction step. Code that assembles a recipe by hand should call
//! `validate` itself.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest prep or cook time accepted from a reply (one week)
pub const MAX_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    #[serde(default)]
    pub nutrition: Nutrition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_recommended: Option<String>,
}

impl Recipe {
    /// Create a recipe, rejecting an empty ingredient list or step list
    pub fn new(
        title: impl Into<String>,
        ingredients: Vec<Ingredient>,
        instructions: Vec<String>,
    ) -> Result<Self> {
        let recipe = Self {
            title: title.into(),
            description: None,
            ingredients,
            instructions,
            nutrition: Nutrition::default(),
            prep_minutes: None,
            cook_minutes: None,
            source: Source::Generated,
            why_recommended: None,
        };
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingredients.is_empty() {
            return Err(Error::malformed_response("recipe has no ingredients")
                .with_context("title", self.title.clone()));
        }
        if self.instructions.is_empty() {
            return Err(Error::malformed_response("recipe has no instructions")
                .with_context("title", self.title.clone()));
        }
        Ok(())
    }

    pub fn total_minutes(&self) -> Option<u32> {
        match (self.prep_minutes, self.cook_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0).saturating_add(cook.unwrap_or(0))),
        }
    }

    /// Whether any ingredient line names `item` (case-insensitive substring)
    pub fn mentions(&self, item: &str) -> bool {
        let needle = item.to_lowercase();
        self.ingredients
            .iter()
            .any(|i| i.item.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub item: String,
}

const UNITS: &[&str] = &[
    "cup", "cups", "tbsp", "tablespoon", "tablespoons", "tsp", "teaspoon", "teaspoons",
    "lb", "lbs", "pound", "pounds", "oz", "ounce", "ounces", "g", "gram", "grams", "kg",
    "ml", "l", "liter", "liters", "litre", "litres", "clove", "cloves", "can", "cans",
    "slice", "slices", "pinch", "dash", "handful", "bunch", "piece", "pieces", "stalk",
    "stalks", "sprig", "sprigs", "package", "packages", "scoop", "scoops",
];

impl Ingredient {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            quantity: None,
            unit: None,
            item: item.into(),
        }
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>, unit: Option<String>) -> Self {
        self.quantity = Some(quantity.into());
        self.unit = unit;
        self
    }

    /// Split a line such as "1 1/2 cups rice" or "2 tbsp olive oil" into
    /// quantity, unit and item. Anything that does not start with a number is
    /// kept whole as the item.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim();
        if line.is_empty() {
            return None;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let quantity_len = words.iter().take_while(|w| is_quantity(w)).count();
        if quantity_len == 0 || quantity_len == words.len() {
            return Some(Self::new(line));
        }

        let quantity = words[..quantity_len].join(" ");
        let rest = &words[quantity_len..];
        let candidate = rest[0].trim_end_matches('.').to_lowercase();
        let (unit, item_words) = if rest.len() > 1 && UNITS.contains(&candidate.as_str()) {
            (Some(candidate), &rest[1..])
        } else {
            (None, rest)
        };

        Some(Self {
            quantity: Some(quantity),
            unit,
            item: item_words.join(" "),
        })
    }
}

fn is_quantity(word: &str) -> bool {
    let mut has_digit = false;
    for c in word.chars() {
        match c {
            '0'..='9' => has_digit = true,
            '/' | '.' | '-' | '½' | '¼' | '¾' => {}
            _ => return false,
        }
    }
    has_digit || matches!(word, "½" | "¼" | "¾")
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(quantity) = &self.quantity {
            write!(f, "{} ", quantity)?;
        }
        if let Some(unit) = &self.unit {
            write!(f, "{} ", unit)?;
        }
        write!(f, "{}", self.item)
    }
}

/// Nutrition summary. Macros are grams per serving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_g: Option<f32>,
    #[serde(default)]
    pub estimated: bool,
}

impl Nutrition {
    pub fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.protein_g.is_none()
            && self.carbs_g.is_none()
            && self.fat_g.is_none()
            && self.fiber_g.is_none()
    }
}

impl fmt::Display for Nutrition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(cal) = self.calories {
            parts.push(format!("Calories: {}", cal));
        }
        for (label, value) in [
            ("Protein", self.protein_g),
            ("Carbs", self.carbs_g),
            ("Fat", self.fat_g),
            ("Fiber", self.fiber_g),
        ] {
            if let Some(v) = value {
                parts.push(format!("{}: {}g", label, v));
            }
        }
        if parts.is_empty() {
            return write!(f, "not specified");
        }
        write!(f, "{}", parts.join(", "))?;
        if self.estimated {
            write!(f, " (estimated)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum Source {
    #[default]
    Generated,
    Url(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Generated => write!(f, "generated"),
            Source::Url(url) => write!(f, "{}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_ingredients_and_steps() {
        let err = Recipe::new("Empty", vec![], vec!["Cook".into()]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedResponse);

        let err = Recipe::new("No steps", vec![Ingredient::new("rice")], vec![]).unwrap_err();
        assert!(err.message().contains("instructions"));

        let recipe = Recipe::new("Rice", vec![Ingredient::new("rice")], vec!["Boil".into()]).unwrap();
        assert_eq!(recipe.source, Source::Generated);
    }

    #[test]
    fn test_parse_ingredient() {
        let i = Ingredient::parse("1 lb chicken breast").unwrap();
        assert_eq!(i.quantity.as_deref(), Some("1"));
        assert_eq!(i.unit.as_deref(), Some("lb"));
        assert_eq!(i.item, "chicken breast");

        let i = Ingredient::parse("1 1/2 cups jasmine rice").unwrap();
        assert_eq!(i.quantity.as_deref(), Some("1 1/2"));
        assert_eq!(i.unit.as_deref(), Some("cups"));
        assert_eq!(i.item, "jasmine rice");

        let i = Ingredient::parse("1 onion, diced").unwrap();
        assert_eq!(i.unit, None);
        assert_eq!(i.item, "onion, diced");

        let i = Ingredient::parse("- Salt to taste").unwrap();
        assert_eq!(i.quantity, None);
        assert_eq!(i.item, "Salt to taste");

        assert!(Ingredient::parse("   ").is_none());
    }

    #[test]
    fn test_ingredient_display() {
        let i = Ingredient::new("olive oil").with_quantity("2", Some("tbsp".into()));
        assert_eq!(i.to_string(), "2 tbsp olive oil");
    }

    #[test]
    fn test_nutrition_display() {
        let n = Nutrition {
            calories: Some(350),
            protein_g: Some(28.0),
            estimated: true,
            ..Default::default()
        };
        assert_eq!(n.to_string(), "Calories: 350, Protein: 28g (estimated)");
        assert_eq!(Nutrition::default().to_string(), "not specified");
    }

    #[test]
    fn test_total_minutes_and_mentions() {
        let mut recipe = Recipe::new(
            "Chicken Rice",
            vec![Ingredient::parse("1 lb Chicken breast").unwrap()],
            vec!["Cook it".into()],
        )
        .unwrap();
        assert_eq!(recipe.total_minutes(), None);
        recipe.prep_minutes = Some(10);
        recipe.cook_minutes = Some(25);
        assert_eq!(recipe.total_minutes(), Some(35));
        recipe.prep_minutes = Some(u32::MAX);
        recipe.cook_minutes = Some(5);
        assert_eq!(recipe.total_minutes(), Some(u32::MAX));
        assert!(recipe.mentions("chicken"));
        assert!(!recipe.mentions("nuts"));
    }

    #[test]
    fn test_source_serde() {
        let json = serde_json::to_string(&Source::Url("https://example.com/r".into())).unwrap();
        assert_eq!(json, r#"{"kind":"url","url":"https://example.com/r"}"#);
        let json = serde_json::to_string(&Source::Generated).unwrap();
        assert_eq!(json, r#"{"kind":"generated"}"#);
    }
}
