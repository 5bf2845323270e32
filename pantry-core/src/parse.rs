//! Response parsing
//!
//! Models rarely return exactly the JSON they were asked for. The parser
//! accepts a fenced code block or the outermost braces, an array of recipes
//! (first one wins), the common field spellings, and falls back to a labelled
//! plain-text layout. Whatever the route, the result must have at least one
//! ingredient and one step, or it is a `MalformedResponse`.

use crate::error::{Error, Result};
use crate::recipe::{Ingredient, Nutrition, Recipe, Source, MAX_MINUTES};
use serde_json::{Map, Value};

const DEFAULT_TITLE: &str = "Generated recipe";

/// Parse the model's reply into a [`Recipe`]
pub fn parse_recipe(text: &str) -> Result<Recipe> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::malformed_response("empty response").with_operation("parse::recipe"));
    }

    let recipe = match extract_json(text) {
        Some(value) => match pick_recipe_object(&value) {
            Some(obj) => from_object(obj),
            None => {
                return Err(Error::malformed_response("JSON response contains no recipe object")
                    .with_operation("parse::recipe"))
            }
        },
        None => from_text(text),
    };

    recipe
        .validate()
        .map_err(|e| e.with_operation("parse::recipe"))?;
    Ok(recipe)
}

// ============================================================================
// JSON extraction
// ============================================================================

/// Find a JSON value in free text: a fenced block first, then the span
/// between the first opening and last closing brace or bracket.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) else {
            continue;
        };
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
    }
    None
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // skip the info string ("json") up to the end of the line
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn pick_recipe_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().find_map(|v| v.as_object()),
        Value::Object(obj) => {
            for key in ["recipe", "recipes"] {
                match obj.get(key) {
                    Some(Value::Object(inner)) => return Some(inner),
                    Some(Value::Array(items)) => {
                        if let Some(inner) = items.iter().find_map(|v| v.as_object()) {
                            return Some(inner);
                        }
                    }
                    _ => {}
                }
            }
            Some(obj)
        }
        _ => None,
    }
}

// ============================================================================
// Lenient field mapping
// ============================================================================

fn get<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
}

fn get_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    get(obj, keys)
        .and_then(value_to_string)
        .filter(|s| !s.is_empty())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn from_object(obj: &Map<String, Value>) -> Recipe {
    let ingredients = get(obj, &["ingredients", "ingredient_list"])
        .map(parse_ingredients)
        .unwrap_or_default();
    let instructions = get(obj, &["instructions", "steps", "directions", "method"])
        .map(parse_steps)
        .unwrap_or_default();

    let nutrition = get(obj, &["nutrition", "nutrition_info", "nutritional_info"])
        .map(parse_nutrition_value)
        .unwrap_or_default();

    let source = match get_str(obj, &["source", "url", "source_url"]) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Source::Url(url),
        _ => Source::Generated,
    };

    Recipe {
        title: get_str(obj, &["title", "name", "recipe_name"]).unwrap_or_else(|| DEFAULT_TITLE.into()),
        description: get_str(obj, &["description", "summary"]),
        ingredients,
        instructions,
        nutrition,
        prep_minutes: get(obj, &["prep_minutes", "prep_time", "prepTime", "preparation_time"])
            .and_then(value_to_minutes),
        cook_minutes: get(obj, &["cook_minutes", "cook_time", "cookTime", "cooking_time"])
            .and_then(value_to_minutes),
        source,
        why_recommended: get_str(obj, &["why_recommended", "whyRecommended", "why", "reason"]),
    }
}

fn parse_ingredients(value: &Value) -> Vec<Ingredient> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_ingredient).collect(),
        Value::String(s) => split_lines_or_commas(s)
            .into_iter()
            .filter_map(|line| Ingredient::parse(&line))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_ingredient(value: &Value) -> Option<Ingredient> {
    match value {
        Value::String(s) => Ingredient::parse(s),
        Value::Object(obj) => {
            let item = get_str(obj, &["item", "name", "ingredient", "food"])?;
            let quantity = get_str(obj, &["quantity", "amount", "qty"]);
            let unit = get_str(obj, &["unit", "units", "measure"]);
            Some(Ingredient { quantity, unit, item })
        }
        _ => None,
    }
}

fn parse_steps(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Object(obj) => get_str(obj, &["text", "instruction", "description", "step"]),
                other => value_to_string(other),
            })
            .collect(),
        Value::String(s) => s.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    };
    raw.iter()
        .map(|s| strip_step_prefix(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_lines_or_commas(s: &str) -> Vec<String> {
    let lines: Vec<&str> = s.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() > 1 {
        lines.into_iter().map(str::to_string).collect()
    } else {
        s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
    }
}

/// Remove "Step 3:", "3.", "3)" and bullet prefixes from a step
pub fn strip_step_prefix(step: &str) -> String {
    let mut s = step.trim().trim_start_matches(['-', '*', '•']).trim_start();

    if s.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("step")) {
        let rest = s[4..].trim_start();
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            s = rest[digits..].trim_start_matches([':', '.', ')', '-']).trim_start();
        }
    } else {
        let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && digits < s.len() {
            let rest = &s[digits..];
            if rest.starts_with(['.', ')', ':']) {
                s = rest[1..].trim_start();
            }
        }
    }
    s.trim().to_string()
}

// ============================================================================
// Times and nutrition
// ============================================================================

fn value_to_minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().and_then(whole_minutes),
        Value::String(s) => parse_minutes(s),
        _ => None,
    }
}

/// Minutes outside `0..=MAX_MINUTES` are treated as unknown
fn whole_minutes(value: f64) -> Option<u32> {
    (0.0..=f64::from(MAX_MINUTES)).contains(&value).then(|| value.round() as u32)
}

/// Read a duration such as "15 minutes", "1 hour", "1 hr 30 min", "1.5 hours"
/// or "1 1/2 hours" as whole minutes. Ranges ("10-15 minutes") use the lower
/// bound.
pub fn parse_minutes(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    let mut total = 0.0f64;
    let mut found = false;
    let mut i = 0;
    while i < words.len() {
        let (number, unit_attached) = split_number(words[i]);
        let Some(mut number) = number else {
            i += 1;
            continue;
        };
        let mut next = i + 1;
        // "1 1/2 hours"
        if unit_attached.is_empty() {
            if let Some((Some(fraction), "")) = words
                .get(next)
                .filter(|w| w.contains('/'))
                .map(|w| split_number(w))
            {
                number += fraction;
                next += 1;
            }
        }
        let unit = if !unit_attached.is_empty() {
            unit_attached
        } else {
            words.get(next).copied().unwrap_or("")
        };
        let factor = if unit.starts_with('h') { 60.0 } else { 1.0 };
        total += number * factor;
        found = true;
        if unit_attached.is_empty() && !unit.is_empty() && unit.chars().all(char::is_alphabetic) {
            next += 1;
        }
        i = next;
    }
    if found {
        whole_minutes(total)
    } else {
        None
    }
}

/// Split "15min" into (15, "min"). A range "10-15" yields its lower bound and
/// "1/2" its value as a fraction.
fn split_number(word: &str) -> (Option<f64>, &str) {
    let end = word
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '/'))
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    let (num, rest) = word.split_at(end);
    let first = num.split('-').next().unwrap_or("");
    let value = match first.split_once('/') {
        Some((n, d)) => match (n.parse::<f64>(), d.parse::<f64>()) {
            (Ok(n), Ok(d)) if d > 0.0 => Some(n / d),
            _ => None,
        },
        None => first.parse::<f64>().ok(),
    };
    (value, rest)
}

fn parse_nutrition_value(value: &Value) -> Nutrition {
    match value {
        Value::String(s) => parse_nutrition(s),
        Value::Object(obj) => {
            let number = |keys: &[&str]| -> Option<f32> {
                get(obj, keys).and_then(|v| match v {
                    Value::Number(n) => n.as_f64().map(|f| f as f32),
                    Value::String(s) => leading_number(s),
                    _ => None,
                })
            };
            let estimated = match get(obj, &["estimated", "is_estimated"]) {
                Some(Value::Bool(b)) => *b,
                _ => obj
                    .values()
                    .filter_map(Value::as_str)
                    .any(|s| s.to_lowercase().contains("estimat")),
            };
            Nutrition {
                calories: number(&["calories", "kcal", "energy"]).map(|c| c.round() as u32),
                protein_g: number(&["protein", "protein_g"]),
                carbs_g: number(&["carbs", "carbs_g", "carbohydrates"]),
                fat_g: number(&["fat", "fat_g"]),
                fiber_g: number(&["fiber", "fiber_g", "fibre"]),
                estimated,
            }
        }
        _ => Nutrition::default(),
    }
}

/// Parse "Calories: 350 (estimated), Protein: 28g, Carbs: 12g, Fat: 18g"
pub fn parse_nutrition(text: &str) -> Nutrition {
    let mut nutrition = Nutrition {
        estimated: text.to_lowercase().contains("estimat"),
        ..Default::default()
    };
    for part in text.split([',', ';', '\n']) {
        let Some((label, value)) = part.split_once(':') else {
            continue;
        };
        let label = label.trim().to_lowercase();
        let Some(number) = leading_number(value) else {
            continue;
        };
        if label.contains("calor") || label.contains("kcal") {
            nutrition.calories = Some(number.round() as u32);
        } else if label.contains("protein") {
            nutrition.protein_g = Some(number);
        } else if label.contains("carb") {
            nutrition.carbs_g = Some(number);
        } else if label.contains("fat") {
            nutrition.fat_g = Some(number);
        } else if label.contains("fib") {
            nutrition.fiber_g = Some(number);
        }
    }
    nutrition
}

fn leading_number(text: &str) -> Option<f32> {
    let text = text.trim_start().trim_start_matches('~');
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

// ============================================================================
// Plain-text fallback
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Ingredients,
    Instructions,
}

enum Label {
    Title,
    Description,
    Ingredients,
    Instructions,
    Prep,
    Cook,
    Nutrition,
    Why,
}

const LABELS: &[(&str, Label)] = &[
    ("title", Label::Title),
    ("name", Label::Title),
    ("recipe", Label::Title),
    ("description", Label::Description),
    ("ingredients", Label::Ingredients),
    ("instructions", Label::Instructions),
    ("steps", Label::Instructions),
    ("directions", Label::Instructions),
    ("method", Label::Instructions),
    ("prep time", Label::Prep),
    ("preparation time", Label::Prep),
    ("cook time", Label::Cook),
    ("cooking time", Label::Cook),
    ("nutrition", Label::Nutrition),
    ("why recommended", Label::Why),
    ("why", Label::Why),
];

/// Split "Prep time: 15 minutes" into its label and the text after the colon
fn labelled(line: &str) -> Option<(&'static Label, &str)> {
    let cleaned = line.trim_start_matches(['#', '*', ' ']);
    let (head, rest) = cleaned.split_once(':')?;
    let head = head.trim().trim_end_matches('*').trim().to_lowercase();
    // "Recipe 1: Lemon Chicken" is a title too
    let head = head.trim_end_matches(|c: char| c.is_ascii_digit() || c == ' ');
    LABELS
        .iter()
        .find(|(name, _)| *name == head)
        .map(|(_, label)| (label, rest.trim_start_matches('*').trim()))
}

fn from_text(text: &str) -> Recipe {
    let mut recipe = Recipe {
        title: String::new(),
        description: None,
        ingredients: Vec::new(),
        instructions: Vec::new(),
        nutrition: Nutrition::default(),
        prep_minutes: None,
        cook_minutes: None,
        source: Source::Generated,
        why_recommended: None,
    };
    let mut section = Section::None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((label, rest)) = labelled(line) {
            section = Section::None;
            match label {
                Label::Title => recipe.title = rest.to_string(),
                Label::Description => recipe.description = Some(rest.to_string()).filter(|s| !s.is_empty()),
                Label::Ingredients => {
                    section = Section::Ingredients;
                    recipe.ingredients.extend(
                        split_lines_or_commas(rest).iter().filter_map(|l| Ingredient::parse(l)),
                    );
                }
                Label::Instructions => {
                    section = Section::Instructions;
                    let step = strip_step_prefix(rest);
                    if !step.is_empty() {
                        recipe.instructions.push(step);
                    }
                }
                Label::Prep => recipe.prep_minutes = parse_minutes(rest),
                Label::Cook => recipe.cook_minutes = parse_minutes(rest),
                Label::Nutrition => recipe.nutrition = parse_nutrition(rest),
                Label::Why => recipe.why_recommended = Some(rest.to_string()).filter(|s| !s.is_empty()),
            }
            continue;
        }

        match section {
            Section::Ingredients => recipe.ingredients.extend(Ingredient::parse(line)),
            Section::Instructions => {
                let step = strip_step_prefix(line);
                if !step.is_empty() {
                    recipe.instructions.push(step);
                }
            }
            Section::None => {
                if recipe.title.is_empty() {
                    recipe.title = line.trim_start_matches('#').trim().to_string();
                }
            }
        }
    }

    if recipe.title.is_empty() {
        recipe.title = DEFAULT_TITLE.to_string();
    }
    recipe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ORIGINAL_SHAPE: &str = r#"Here you go!
```json
[
  {
    "name": "Lemon Garlic Tofu Bowl",
    "description": "Crispy tofu over rice.",
    "ingredients": ["1 block firm tofu", "2 tbsp olive oil", "1 cup jasmine rice"],
    "instructions": ["Step 1: Press the tofu", "Step 2: Fry until golden", "Step 3: Serve over rice"],
    "prep_time": "15 minutes",
    "cook_time": "25 minutes",
    "nutrition": "Calories: 350 (estimated), Protein: 28g, Carbs: 12g, Fat: 18g, Fiber: 3g",
    "why_recommended": "High protein and vegan."
  }
]
```"#;

    #[test]
    fn test_parse_original_shape() {
        let recipe = parse_recipe(ORIGINAL_SHAPE).unwrap();
        assert_eq!(recipe.title, "Lemon Garlic Tofu Bowl");
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.ingredients[1].unit.as_deref(), Some("tbsp"));
        assert_eq!(recipe.instructions[0], "Press the tofu");
        assert_eq!(recipe.prep_minutes, Some(15));
        assert_eq!(recipe.cook_minutes, Some(25));
        assert_eq!(recipe.nutrition.calories, Some(350));
        assert_eq!(recipe.nutrition.protein_g, Some(28.0));
        assert_eq!(recipe.nutrition.fiber_g, Some(3.0));
        assert!(recipe.nutrition.estimated);
        assert_eq!(recipe.source, Source::Generated);
        assert_eq!(recipe.why_recommended.as_deref(), Some("High protein and vegan."));
    }

    #[test]
    fn test_parse_structured_object() {
        let text = r#"{"recipe": {
            "title": "Chickpea Curry",
            "ingredients": [{"quantity": 2, "unit": "cups", "item": "chickpeas"}],
            "steps": [{"text": "Simmer everything"}],
            "prep_minutes": 10,
            "cook_minutes": 30,
            "nutrition": {"calories": 420, "protein": "18g", "estimated": true},
            "source": "https://example.com/curry"
        }}"#;

        let recipe = parse_recipe(text).unwrap();
        assert_eq!(recipe.title, "Chickpea Curry");
        assert_eq!(recipe.ingredients[0].quantity.as_deref(), Some("2"));
        assert_eq!(recipe.ingredients[0].item, "chickpeas");
        assert_eq!(recipe.instructions, vec!["Simmer everything"]);
        assert_eq!(recipe.total_minutes(), Some(40));
        assert_eq!(recipe.nutrition.protein_g, Some(18.0));
        assert_eq!(recipe.source, Source::Url("https://example.com/curry".into()));
    }

    #[test]
    fn test_missing_steps_is_malformed() {
        let text = r#"{"title": "Toast", "ingredients": ["1 slice bread"], "instructions": []}"#;
        let err = parse_recipe(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);

        let text = r#"{"title": "Air", "ingredients": [], "instructions": ["Breathe"]}"#;
        assert_eq!(parse_recipe(text).unwrap_err().kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_garbage_is_malformed() {
        for text in ["", "   ", "Sorry, I can't help with that.", "[1, 2, 3]"] {
            let err = parse_recipe(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedResponse, "text {:?}", text);
        }
    }

    #[test]
    fn test_text_fallback() {
        let text = "\
Title: Overnight Oats
Description: No-cook breakfast.
Ingredients:
- 1/2 cup rolled oats
- 1/2 cup almond-free oat milk
- 1 tbsp chia seeds
Instructions:
1. Combine everything in a jar.
2. Refrigerate overnight.
Prep time: 5 minutes
Cook time: 0 minutes
Nutrition: Calories: 300, Protein: 10g";

        let recipe = parse_recipe(text).unwrap();
        assert_eq!(recipe.title, "Overnight Oats");
        assert_eq!(recipe.description.as_deref(), Some("No-cook breakfast."));
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.ingredients[2].item, "chia seeds");
        assert_eq!(recipe.instructions, vec!["Combine everything in a jar.", "Refrigerate overnight."]);
        assert_eq!(recipe.prep_minutes, Some(5));
        assert_eq!(recipe.cook_minutes, Some(0));
        assert_eq!(recipe.nutrition.calories, Some(300));
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("15 minutes"), Some(15));
        assert_eq!(parse_minutes("1 hour"), Some(60));
        assert_eq!(parse_minutes("1 hr 30 min"), Some(90));
        assert_eq!(parse_minutes("1.5 hours"), Some(90));
        assert_eq!(parse_minutes("10-15 minutes"), Some(10));
        assert_eq!(parse_minutes("20min"), Some(20));
        assert_eq!(parse_minutes("a while"), None);
    }

    #[test]
    fn test_parse_minutes_fractions() {
        assert_eq!(parse_minutes("1/2 hour"), Some(30));
        assert_eq!(parse_minutes("1 1/2 hours"), Some(90));
        assert_eq!(parse_minutes("3/4 hr"), Some(45));
        assert_eq!(parse_minutes("1/0 hour"), None);
    }

    #[test]
    fn test_absurd_durations_are_unknown() {
        assert_eq!(parse_minutes("9999999 hours"), None);
        assert_eq!(parse_minutes("10080 minutes"), Some(10080));

        let text = r#"{
            "title": "Slow Beans",
            "ingredients": ["beans"],
            "instructions": ["Simmer"],
            "prep_time": 5000000000,
            "cook_time": 5
        }"#;
        let recipe = parse_recipe(text).unwrap();
        assert_eq!(recipe.prep_minutes, None);
        assert_eq!(recipe.cook_minutes, Some(5));
        assert_eq!(recipe.total_minutes(), Some(5));
    }

    #[test]
    fn test_strip_step_prefix() {
        assert_eq!(strip_step_prefix("Step 1: Heat oil"), "Heat oil");
        assert_eq!(strip_step_prefix("2. Season"), "Season");
        assert_eq!(strip_step_prefix("3) Serve"), "Serve");
        assert_eq!(strip_step_prefix("- Rest 5 minutes"), "Rest 5 minutes");
        assert_eq!(strip_step_prefix("350F oven"), "350F oven");
    }
}
