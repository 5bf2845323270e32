//! First-run questionnaire
//!
//! Asks five questions in a fixed order and builds a [`Profile`] from the
//! answers. The same flow edits an existing profile: an empty answer keeps the
//! current value and `none` clears it.

use crate::display;
use crate::input::InputSource;
use pantry_core::{parse_list, Profile, Result};
use std::collections::BTreeSet;
use std::io::Write;
use tracing::debug;

struct Question {
    prompt: &'static str,
    hint: &'static str,
}

const QUESTIONS: [Question; 5] = [
    Question {
        prompt: "What foods or flavors do you like?",
        hint: "e.g. vegan, spicy, italian, chicken",
    },
    Question {
        prompt: "Any foods you dislike?",
        hint: "e.g. olives, mushrooms",
    },
    Question {
        prompt: "Any food allergies?",
        hint: "e.g. nuts, shellfish, dairy",
    },
    Question {
        prompt: "Any dietary restrictions?",
        hint: "e.g. vegetarian, gluten-free, keto",
    },
    Question {
        prompt: "What are your fitness goals?",
        hint: "e.g. high-protein, weight loss, muscle gain",
    },
];

fn current(existing: &Profile, index: usize) -> &BTreeSet<String> {
    match index {
        0 => &existing.liked,
        1 => &existing.disliked,
        2 => &existing.allergies,
        3 => &existing.dietary_restrictions,
        _ => &existing.fitness_goals,
    }
}

/// Run the questionnaire. Returns `Ok(None)` if input ends before the last
/// answer; nothing is saved in that case.
pub async fn run_onboarding<I, W>(
    input: &mut I,
    out: &mut W,
    existing: Option<&Profile>,
) -> Result<Option<Profile>>
where
    I: InputSource,
    W: Write,
{
    writeln!(out)?;
    match existing {
        None => {
            display::info(out, "Let's set up your profile. Separate items with commas.")?;
            display::info(out, "Press Enter or type 'none' to skip a question.")?;
        }
        Some(_) => {
            display::info(out, "Update your profile. Press Enter to keep the current value,")?;
            display::info(out, "or type 'none' to clear it.")?;
        }
    }

    let mut answers: Vec<Vec<String>> = Vec::with_capacity(QUESTIONS.len());
    for (i, question) in QUESTIONS.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{} ({})", question.prompt, question.hint)?;
        if let Some(profile) = existing {
            let items = current(profile, i);
            let shown = if items.is_empty() {
                "none".to_string()
            } else {
                items.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            writeln!(out, "  current: {}", shown)?;
        }
        display::prompt(out, ">")?;

        let Some(line) = input.next_line().await else {
            debug!(question = i, "input ended during onboarding");
            return Ok(None);
        };

        let answer = match existing {
            Some(profile) if line.trim().is_empty() => current(profile, i).iter().cloned().collect(),
            _ => parse_list(&line),
        };
        answers.push(answer);
    }

    let overlap: Vec<String> = answers[0]
        .iter()
        .filter(|item| answers[2].contains(item))
        .cloned()
        .collect();

    let mut answers = answers.into_iter();
    let mut next = || answers.next().unwrap_or_default();
    let mut builder = Profile::builder()
        .liked(next())
        .disliked(next())
        .allergies(next())
        .dietary_restrictions(next())
        .fitness_goals(next());
    if let Some(profile) = existing {
        builder = builder
            .model(profile.model.clone())
            .created_at(profile.created_at);
    }
    let profile = builder.build();

    for item in overlap {
        display::warning(
            out,
            &format!("'{}' is listed as an allergy, so it was removed from liked foods", item),
        )?;
    }
    Ok(Some(profile))
}
