//! # Request Interpreter
//!
//! Turns one free-text utterance plus the active profile into a
//! [`RecipeRequest`]: meal-context tags, the dish type, the profile's
//! allergies as hard exclusions and the preferences that fit the dish.
//!
//! Utterances with no food intent at all ("hi", "thanks!", "?!", "tell me a
//! joke") are rejected here and never reach the generation service.

use crate::error::{Error, Result};
use crate::matcher::{contains_phrase, mentions_food, MatchContext, RecipeType};
use crate::profile::Profile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A structured recipe request. Fields are fixed once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequest {
    utterance: String,
    issued_at: DateTime<Utc>,
    tags: Vec<String>,
    recipe_type: RecipeType,
    exclusions: Vec<String>,
    #[serde(default)]
    avoid: Vec<String>,
    #[serde(default)]
    dietary_restrictions: Vec<String>,
    #[serde(default)]
    preferences: Vec<String>,
    #[serde(default)]
    fitness_goals: Vec<String>,
    #[serde(default)]
    allergen_mentions: Vec<String>,
}

impl RecipeRequest {
    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Meal-time and goal tags, e.g. `dinner`, `high-protein`
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn recipe_type(&self) -> RecipeType {
        self.recipe_type
    }

    /// Allergens; the recipe must not contain any of these
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Disliked foods; avoid when possible
    pub fn avoid(&self) -> &[String] {
        &self.avoid
    }

    pub fn dietary_restrictions(&self) -> &[String] {
        &self.dietary_restrictions
    }

    /// Liked foods that fit this dish
    pub fn preferences(&self) -> &[String] {
        &self.preferences
    }

    /// Fitness goals that fit this dish
    pub fn fitness_goals(&self) -> &[String] {
        &self.fitness_goals
    }

    /// Allergens the utterance itself asked for
    pub fn allergen_mentions(&self) -> &[String] {
        &self.allergen_mentions
    }
}

const FILLER: &[&str] = &[
    "hi", "hello", "hey", "yo", "thanks", "thank", "thx", "please", "pls", "ok", "okay", "yes",
    "yeah", "no", "nope", "sure", "cool", "great", "nice", "the", "a", "an", "i", "i'm", "me",
    "my", "we", "us", "our", "you", "your", "it", "this", "that", "to", "for", "of", "and", "or",
    "with", "some", "something", "anything", "want", "wanna", "would", "like", "need", "can",
    "could", "give", "get", "have", "be", "is", "are", "what", "how", "do", "so", "just", "again",
    "bye", "good",
];

const MEAL_TAGS: &[(&str, &[&str])] = &[
    ("breakfast", &["breakfast", "morning"]),
    ("brunch", &["brunch"]),
    ("lunch", &["lunch", "noon", "midday"]),
    ("dinner", &["dinner", "supper", "tonight", "evening"]),
    ("snack", &["snack"]),
    ("dessert", &["dessert", "sweet"]),
];

const GOAL_TAGS: &[(&str, &[&str])] = &[
    ("high-protein", &["high protein", "high-protein", "protein-rich", "protein rich"]),
    ("low-carb", &["low carb", "low-carb", "keto"]),
    ("low-calorie", &["low calorie", "low-calorie", "low cal", "light"]),
    ("quick", &["quick", "fast", "easy"]),
    ("vegan", &["vegan"]),
    ("vegetarian", &["vegetarian", "veggie"]),
    ("gluten-free", &["gluten free", "gluten-free"]),
];

/// Tag keywords that say when or how, but not what, to eat
const TIMING: &[&str] = &[
    "morning", "tonight", "evening", "noon", "midday", "quick", "fast", "easy", "light",
];

/// Lower-case, turn everything but letters, digits, `-` and `'` into spaces,
/// split on whitespace
pub fn tokenize(utterance: &str) -> Vec<String> {
    utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '-' || c == '\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Turn a free-form goal into a tag: "High Protein" becomes `high-protein`
pub fn goal_tag(goal: &str) -> String {
    goal.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub fn interpret(utterance: &str, profile: &Profile) -> Result<RecipeRequest> {
    interpret_at(utterance, profile, Utc::now())
}

/// Interpret against the profile snapshot taken at the start of the turn
pub fn interpret_at(
    utterance: &str,
    profile: &Profile,
    issued_at: DateTime<Utc>,
) -> Result<RecipeRequest> {
    let tokens = tokenize(utterance);
    if tokens.is_empty() {
        return Err(Error::request_rejected(utterance, "there is nothing to cook in that request")
            .with_operation("interpreter::interpret"));
    }
    if tokens.iter().all(|t| FILLER.contains(&t.as_str())) || !is_food_related(&tokens, profile) {
        return Err(Error::request_rejected(utterance, "no food or meal was mentioned")
            .with_operation("interpreter::interpret"));
    }

    let context = MatchContext::new(&tokens);
    let mut tags = Vec::new();

    for (tag, keywords) in MEAL_TAGS.iter().chain(GOAL_TAGS) {
        if keywords.iter().any(|k| contains_phrase(&tokens, k)) {
            push_unique(&mut tags, tag.to_string());
        }
    }

    let fitness_goals = context.relevant_goals(&profile.fitness_goals);
    for goal in &fitness_goals {
        push_unique(&mut tags, goal_tag(goal));
    }

    let exclusions: Vec<String> = profile.allergies.iter().cloned().collect();
    let avoid: Vec<String> = profile
        .disliked
        .iter()
        .filter(|d| !profile.allergies.contains(*d))
        .cloned()
        .collect();
    let allergen_mentions: Vec<String> = exclusions
        .iter()
        .filter(|a| contains_phrase(&tokens, a))
        .cloned()
        .collect();

    let request = RecipeRequest {
        utterance: utterance.trim().to_string(),
        issued_at,
        tags,
        recipe_type: context.recipe_type(),
        exclusions,
        avoid,
        dietary_restrictions: profile.dietary_restrictions.iter().cloned().collect(),
        preferences: context.relevant_preferences(&profile.liked),
        fitness_goals,
        allergen_mentions,
    };

    debug!(
        tags = ?request.tags,
        recipe_type = %request.recipe_type,
        exclusions = request.exclusions.len(),
        "interpreted request"
    );
    Ok(request)
}

/// A dish or ingredient, a meal or diet keyword, or anything the profile names
fn is_food_related(tokens: &[String], profile: &Profile) -> bool {
    if mentions_food(tokens) {
        return true;
    }
    let mut tag_keywords = MEAL_TAGS
        .iter()
        .chain(GOAL_TAGS)
        .flat_map(|(_, keywords)| keywords.iter())
        .filter(|k| !TIMING.contains(*k));
    if tag_keywords.any(|k| contains_phrase(tokens, k)) {
        return true;
    }
    profile
        .liked
        .iter()
        .chain(&profile.disliked)
        .chain(&profile.allergies)
        .chain(&profile.dietary_restrictions)
        .chain(&profile.fitness_goals)
        .any(|term| contains_phrase(tokens, &term.to_lowercase()))
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}
