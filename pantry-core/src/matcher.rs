//! Preference matching
//!
//! Decides what kind of dish a request is for and which of the user's
//! preferences and fitness goals make sense for it. Nobody wants a spicy
//! cheesecake just because they like spicy food.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeType {
    Dessert,
    Main,
    Appetizer,
    Soup,
    Salad,
    Breakfast,
    Beverage,
}

impl RecipeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeType::Dessert => "dessert",
            RecipeType::Main => "main",
            RecipeType::Appetizer => "appetizer",
            RecipeType::Soup => "soup",
            RecipeType::Salad => "salad",
            RecipeType::Breakfast => "breakfast",
            RecipeType::Beverage => "beverage",
        }
    }
}

impl fmt::Display for RecipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checked in order; the first type with a matching keyword wins
const RECIPE_TYPES: &[(RecipeType, &[&str])] = &[
    (
        RecipeType::Dessert,
        &[
            "dessert", "sweet", "cake", "cookie", "pie", "tart", "muffin", "cupcake", "brownie",
            "pudding", "ice cream", "sorbet", "mousse", "cheesecake", "donut", "pancake",
            "waffle", "crepe",
        ],
    ),
    (RecipeType::Main, &["dinner", "lunch", "main course", "entree", "meal", "supper"]),
    (RecipeType::Appetizer, &["appetizer", "starter", "hors d'oeuvre", "snack"]),
    (RecipeType::Soup, &["soup", "stew", "chowder", "broth"]),
    (RecipeType::Salad, &["salad", "coleslaw", "slaw"]),
    (RecipeType::Breakfast, &["breakfast", "brunch", "morning"]),
    (
        RecipeType::Beverage,
        &["drink", "beverage", "smoothie", "juice", "cocktail", "mocktail", "shake"],
    ),
];

struct PreferenceRule {
    key: &'static str,
    incompatible: &'static [&'static str],
    compatible: &'static [&'static str],
}

const PREFERENCE_RULES: &[PreferenceRule] = &[
    PreferenceRule {
        key: "spicy",
        incompatible: &[
            "dessert", "cake", "cookie", "ice cream", "pudding", "muffin", "pancake", "waffle",
        ],
        compatible: &[
            "main", "dinner", "lunch", "appetizer", "soup", "stir-fry", "curry", "pasta", "rice",
        ],
    },
    PreferenceRule {
        key: "meat",
        incompatible: &["vegetarian", "vegan", "salad", "dessert"],
        compatible: &[
            "main", "dinner", "lunch", "sandwich", "burger", "steak", "chicken", "pork", "beef",
        ],
    },
    PreferenceRule {
        key: "vegetarian",
        incompatible: &["meat", "chicken", "beef", "pork", "fish", "seafood"],
        compatible: &["salad", "vegetable", "pasta", "rice", "soup", "main", "dinner", "lunch"],
    },
    PreferenceRule {
        key: "protein",
        incompatible: &["dessert", "cake", "cookie", "ice cream", "pudding"],
        compatible: &["main", "dinner", "lunch", "breakfast", "snack", "smoothie"],
    },
    PreferenceRule {
        key: "calorie",
        incompatible: &["dessert", "cake", "cookie", "ice cream", "fried", "deep-fried"],
        compatible: &["salad", "soup", "grilled", "baked", "steamed", "main", "dinner", "lunch"],
    },
];

const FRIED: &[&str] = &["fried", "deep-fried"];

/// Ingredients, dishes and eating words beyond the dish-type and preference tables
const FOOD_WORDS: &[&str] = &[
    "food", "eat", "eating", "hungry", "cook", "cooking", "bake", "baking", "grill", "roast",
    "recipe", "dish", "meal prep", "leftover", "ingredient", "cuisine", "pantry", "fridge",
    "chicken", "beef", "pork", "lamb", "turkey", "bacon", "sausage", "ham", "fish", "salmon",
    "tuna", "shrimp", "prawn", "crab", "seafood", "shellfish", "egg", "eggs", "tofu", "tempeh",
    "seitan", "bean", "lentil", "chickpea", "pea", "rice", "quinoa", "oat", "oatmeal", "bread",
    "toast", "pasta", "noodle", "spaghetti", "lasagna", "pizza", "taco", "burrito", "sandwich",
    "burger", "wrap", "curry", "stir-fry", "casserole", "risotto", "sushi", "dumpling", "omelette",
    "frittata", "chili", "bowl", "cheese", "milk", "yogurt", "butter", "cream", "dairy", "nut",
    "peanut", "almond", "cashew", "walnut", "vegetable", "veg", "tomato", "potato", "onion",
    "garlic", "carrot", "broccoli", "spinach", "kale", "mushroom", "pepper", "zucchini",
    "eggplant", "cauliflower", "corn", "avocado", "fruit", "apple", "banana", "berry", "lemon",
    "lime", "mango", "chocolate", "honey", "sugar", "flour", "gluten", "wheat", "soy", "herb",
    "spice", "sauce", "olive", "coffee", "tea",
];

/// Table words that say when, not what, to eat
const NOT_FOOD: &[&str] = &["morning", "main"];

/// The words of a request plus the dish type derived from them
#[derive(Debug, Clone)]
pub struct MatchContext {
    tokens: Vec<String>,
    recipe_type: RecipeType,
}

impl MatchContext {
    pub fn new(tokens: &[String]) -> Self {
        let recipe_type = detect_recipe_type(tokens);
        let mut tokens = tokens.to_vec();
        // the dish type counts as context too, so "cheesecake" reads as dessert
        tokens.push(recipe_type.as_str().to_string());
        Self { tokens, recipe_type }
    }

    pub fn recipe_type(&self) -> RecipeType {
        self.recipe_type
    }

    fn mentions(&self, phrase: &str) -> bool {
        contains_phrase(&self.tokens, phrase)
    }

    fn mentions_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.mentions(p))
    }

    fn is_dessert(&self) -> bool {
        self.recipe_type == RecipeType::Dessert
    }

    /// Whether a liked food or preference applies to this dish
    pub fn preference_applies(&self, preference: &str) -> bool {
        let preference = preference.to_lowercase();
        for rule in PREFERENCE_RULES {
            if !preference.contains(rule.key) {
                continue;
            }
            if self.mentions_any(rule.incompatible) {
                return false;
            }
            if self.mentions_any(rule.compatible) {
                return true;
            }
        }
        true
    }

    /// Whether a fitness goal applies to this dish
    pub fn goal_applies(&self, goal: &str) -> bool {
        let goal = goal.to_lowercase();
        if (goal.contains("protein") || goal.contains("muscle")) && self.is_dessert() {
            return false;
        }
        if goal.contains("calorie") && (self.is_dessert() || self.mentions_any(FRIED)) {
            return false;
        }
        true
    }

    pub fn relevant_preferences<'a, I>(&self, preferences: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        preferences
            .into_iter()
            .filter(|p| self.preference_applies(p))
            .cloned()
            .collect()
    }

    pub fn relevant_goals<'a, I>(&self, goals: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        goals
            .into_iter()
            .filter(|g| self.goal_applies(g))
            .cloned()
            .collect()
    }
}

pub fn detect_recipe_type(tokens: &[String]) -> RecipeType {
    RECIPE_TYPES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_phrase(tokens, k)))
        .map(|(recipe_type, _)| *recipe_type)
        .unwrap_or(RecipeType::Main)
}

/// Whether the tokens name a dish, ingredient or anything else about eating
pub fn mentions_food(tokens: &[String]) -> bool {
    let dish_words = RECIPE_TYPES.iter().flat_map(|(_, keywords)| keywords.iter());
    let preference_words = PREFERENCE_RULES.iter().flat_map(|rule| {
        std::iter::once(&rule.key)
            .chain(rule.incompatible)
            .chain(rule.compatible)
    });
    dish_words
        .chain(preference_words)
        .chain(FOOD_WORDS)
        .filter(|word| !NOT_FOOD.contains(*word))
        .any(|word| contains_phrase(tokens, word))
}

/// Whether the token sequence contains `phrase` as consecutive whole words.
/// A trailing plural "s"/"es" on a token still matches.
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| word_matches(t, w)))
}

fn word_matches(token: &str, word: &str) -> bool {
    if token == word {
        return true;
    }
    match token.strip_prefix(word) {
        Some("s") | Some("es") => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(|s| s.to_lowercase()).collect()
    }

    #[test]
    fn test_detect_recipe_type() {
        assert_eq!(detect_recipe_type(&tokens("chocolate cheesecake")), RecipeType::Dessert);
        assert_eq!(detect_recipe_type(&tokens("something for dinner")), RecipeType::Main);
        assert_eq!(detect_recipe_type(&tokens("a hearty stew")), RecipeType::Soup);
        assert_eq!(detect_recipe_type(&tokens("green smoothie")), RecipeType::Beverage);
        assert_eq!(detect_recipe_type(&tokens("tacos")), RecipeType::Main);
        // whole words only: "starter" must not read as "tart"
        assert_eq!(detect_recipe_type(&tokens("a starter")), RecipeType::Appetizer);
    }

    #[test]
    fn test_mentions_food() {
        assert!(mentions_food(&tokens("lentil soup")));
        assert!(mentions_food(&tokens("something with tomatoes")));
        assert!(mentions_food(&tokens("tacos")));
        assert!(mentions_food(&tokens("something spicy")));
        assert!(!mentions_food(&tokens("tell me a joke about the weather")));
        assert!(!mentions_food(&tokens("good morning")));
        assert!(!mentions_food(&tokens("the main thing")));
    }

    #[test]
    fn test_contains_phrase() {
        let t = tokens("some chocolate chip cookies please");
        assert!(contains_phrase(&t, "cookie"));
        assert!(contains_phrase(&t, "chocolate chip"));
        assert!(!contains_phrase(&t, "chip chocolate"));
        assert!(!contains_phrase(&t, "coo"));
    }

    #[test]
    fn test_spicy_not_for_desserts() {
        let dessert = MatchContext::new(&tokens("brownies for a party"));
        assert!(!dessert.preference_applies("spicy food"));
        assert!(dessert.preference_applies("chocolate"));

        let dinner = MatchContext::new(&tokens("curry for dinner"));
        assert!(dinner.preference_applies("spicy food"));
    }

    #[test]
    fn test_meat_not_for_salads() {
        let salad = MatchContext::new(&tokens("a fresh salad"));
        assert!(!salad.preference_applies("love meat"));
    }

    #[test]
    fn test_goal_relevance() {
        let dessert = MatchContext::new(&tokens("pancakes"));
        assert!(!dessert.goal_applies("high protein"));
        assert!(!dessert.goal_applies("muscle building"));
        assert!(!dessert.goal_applies("low calorie"));

        let fried = MatchContext::new(&tokens("fried chicken dinner"));
        assert!(!fried.goal_applies("low calorie"));
        assert!(fried.goal_applies("high-protein"));

        let goals = vec!["high-protein".to_string(), "low calorie".to_string()];
        assert_eq!(fried.relevant_goals(&goals), vec!["high-protein".to_string()]);
    }
}
