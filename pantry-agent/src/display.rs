//! Terminal rendering
//!
//! All output goes through a caller-supplied writer so the session can be
//! driven against a buffer in tests. Colors come from `colored` and are
//! switched off globally by `--no-color` or `NO_COLOR`.

use colored::Colorize;
use pantry_core::{HistoryEntry, HistoryStats, Outcome, Profile, Recipe};
use std::collections::BTreeSet;
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

fn join_or(items: &BTreeSet<String>, none: &str) -> String {
    if items.is_empty() {
        none.to_string()
    } else {
        items.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub fn banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", rule('=').cyan())?;
    writeln!(out, "{}", "Welcome to PantryVision - Your AI Recipe Assistant!".cyan().bold())?;
    writeln!(out, "{}", rule('=').cyan())
}

pub fn ready(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "PantryVision is ready! Type a request or 'help' for commands.".green())?;
    writeln!(
        out,
        "{}",
        "Example: 'I want meat for dinner tonight' or 'vegetarian lunch ideas'".cyan()
    )
}

pub fn help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "PantryVision Help".cyan().bold())?;
    writeln!(out, "{}", "Available commands:")?;
    for (names, what) in [
        ("help, h", "Show this help message"),
        ("profile, p", "Show and update your preferences and goals"),
        ("model, m", "Choose the generation model"),
        ("history [n]", "Show your recent requests"),
        ("history clear", "Delete your request history"),
        ("stats, s", "Show your usage statistics"),
        ("clear, c", "Clear the screen"),
        ("reset, r", "Delete your profile and history"),
        ("quit, exit, q", "Exit PantryVision"),
    ] {
        writeln!(out, "  {:<14} - {}", names.green(), what)?;
    }
    writeln!(out)?;
    writeln!(out, "Example requests:")?;
    for example in [
        "I want meat for dinner tonight",
        "vegetarian lunch ideas",
        "high protein breakfast",
        "low calorie snacks",
        "quick 30-minute meals",
    ] {
        writeln!(out, "  {} '{}'", "•".yellow(), example)?;
    }
    Ok(())
}

pub fn recipe(out: &mut impl Write, recipe: &Recipe) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", recipe.title.bold().green())?;
    writeln!(out, "{}", rule('-'))?;
    if let Some(description) = &recipe.description {
        writeln!(out, "{}", description)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Ingredients:".bold())?;
    for ingredient in &recipe.ingredients {
        writeln!(out, "  • {}", ingredient)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Instructions:".bold())?;
    for (i, step) in recipe.instructions.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, step)?;
    }

    writeln!(out)?;
    let mut times = Vec::new();
    if let Some(prep) = recipe.prep_minutes {
        times.push(format!("Prep: {} min", prep));
    }
    if let Some(cook) = recipe.cook_minutes {
        times.push(format!("Cook: {} min", cook));
    }
    if let Some(total) = recipe.total_minutes() {
        times.push(format!("Total: {} min", total));
    }
    if times.is_empty() {
        writeln!(out, "{} not specified", "Time:".bold())?;
    } else {
        writeln!(out, "{} {}", "Time:".bold(), times.join(", "))?;
    }
    writeln!(out, "{} {}", "Nutrition:".bold(), recipe.nutrition)?;
    writeln!(out, "{} {}", "Source:".bold(), recipe.source)?;
    if let Some(why) = &recipe.why_recommended {
        writeln!(out, "{} {}", "Why recommended:".bold(), why)?;
    }
    writeln!(out)
}

pub fn profile(out: &mut impl Write, profile: &Profile) -> io::Result<()> {
    writeln!(out, "{}", "Your profile:".cyan().bold())?;
    writeln!(out, "  Liked foods:          {}", join_or(&profile.liked, "None specified"))?;
    writeln!(out, "  Dislikes:             {}", join_or(&profile.disliked, "None"))?;
    writeln!(out, "  Allergies:            {}", join_or(&profile.allergies, "None"))?;
    writeln!(
        out,
        "  Dietary restrictions: {}",
        join_or(&profile.dietary_restrictions, "None")
    )?;
    writeln!(out, "  Fitness goals:        {}", join_or(&profile.fitness_goals, "None specified"))?;
    writeln!(
        out,
        "  Preferred model:      {}",
        profile.model.as_deref().unwrap_or("(default)")
    )
}

pub fn history(out: &mut impl Write, entries: &[HistoryEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "{}", "No requests yet.".yellow());
    }
    writeln!(out, "{}", "Recent requests:".cyan().bold())?;
    for entry in entries {
        let when = entry.recorded_at.format("%Y-%m-%d %H:%M");
        let result = match &entry.outcome {
            Outcome::Recipe { recipe } => recipe.title.green().to_string(),
            Outcome::Failed { kind, .. } => format!("failed ({})", kind).red().to_string(),
        };
        writeln!(out, "  {}  \"{}\" -> {}", when, entry.request.utterance(), result)?;
    }
    Ok(())
}

pub fn stats(out: &mut impl Write, stats: &HistoryStats, profile: Option<&Profile>) -> io::Result<()> {
    writeln!(out, "{}", "User Statistics:".cyan().bold())?;
    writeln!(out, "{}", "-".repeat(30))?;
    if let Some(profile) = profile {
        writeln!(out, "Profile created:     {}", profile.created_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(out, "Last updated:        {}", profile.updated_at.format("%Y-%m-%d %H:%M"))?;
    }
    writeln!(out, "Total requests:      {}", stats.total_requests)?;
    writeln!(out, "Recipes generated:   {}", stats.successful)?;
    writeln!(out, "Failed requests:     {}", stats.failed)?;
    if let Some(last) = stats.last_request {
        writeln!(out, "Last request:        {}", last.format("%Y-%m-%d %H:%M"))?;
    }
    if !stats.by_recipe_type.is_empty() {
        let kinds: Vec<String> = stats
            .by_recipe_type
            .iter()
            .map(|(kind, n)| format!("{} {}", n, kind))
            .collect();
        writeln!(out, "By dish type:        {}", kinds.join(", "))?;
    }
    if !stats.by_model.is_empty() {
        let models: Vec<String> = stats
            .by_model
            .iter()
            .map(|(model, n)| format!("{} ({})", model, n))
            .collect();
        writeln!(out, "Models used:         {}", models.join(", "))?;
    }
    Ok(())
}

pub fn allergen_warning(out: &mut impl Write, mentions: &[String]) -> io::Result<()> {
    writeln!(
        out,
        "{} you listed {} as an allergy; asking for a recipe without it.",
        "Heads up:".yellow().bold(),
        mentions.join(", ")
    )
}

pub fn info(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{}", message.cyan())
}

pub fn success(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{}", message.green())
}

pub fn warning(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "Warning:".yellow().bold(), message)
}

pub fn error(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "ERROR:".red().bold(), message)
}

/// ANSI clear screen and move the cursor home
pub fn clear_screen(out: &mut impl Write) -> io::Result<()> {
    write!(out, "\x1B[2J\x1B[1;1H")?;
    out.flush()
}

/// Print a prompt without a newline
pub fn prompt(out: &mut impl Write, label: &str) -> io::Result<()> {
    write!(out, "{} ", label.cyan().bold())?;
    out.flush()
}
