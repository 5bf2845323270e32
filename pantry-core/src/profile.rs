//! # User Profile
//!
//! The persisted record of one local user's food preferences. Every item is
//! normalized (trimmed, lower-cased, de-duplicated) on the way in, so set
//! membership checks elsewhere can compare strings directly.
//!
//! ## Invariant
//! The allergy set and the liked set never overlap. [`ProfileBuilder`]
//! repairs an overlap by dropping the allergen from the liked set;
//! [`Profile::validate`] rejects one.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Fixed identifier of the single local user
pub const LOCAL_PROFILE_ID: &str = "local";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub liked: BTreeSet<String>,
    #[serde(default)]
    pub disliked: BTreeSet<String>,
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    #[serde(default)]
    pub dietary_restrictions: BTreeSet<String>,
    #[serde(default)]
    pub fitness_goals: BTreeSet<String>,
    /// Preferred generation model; overrides the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// Reject a profile whose liked and allergy sets overlap
    pub fn validate(&self) -> Result<()> {
        let overlap = self.conflicts();
        if overlap.is_empty() {
            return Ok(());
        }
        Err(Error::profile_invalid(format!(
            "allergens cannot also be liked: {}",
            overlap.join(", ")
        ))
        .with_operation("profile::validate"))
    }

    /// Items that appear in both the liked and allergy sets
    pub fn conflicts(&self) -> Vec<String> {
        self.liked.intersection(&self.allergies).cloned().collect()
    }

    /// Drop liked items that are also allergens. Returns what was removed.
    pub fn repair(&mut self) -> Vec<String> {
        let removed = self.conflicts();
        for item in &removed {
            self.liked.remove(item);
        }
        if !removed.is_empty() {
            warn!(removed = ?removed, "dropped allergens from liked foods");
        }
        removed
    }

    /// Re-apply normalization to every set. Used after loading a file that
    /// may have been edited by hand.
    pub fn normalize(&mut self) {
        for set in [
            &mut self.liked,
            &mut self.disliked,
            &mut self.allergies,
            &mut self.dietary_restrictions,
            &mut self.fitness_goals,
        ] {
            *set = std::mem::take(set)
                .into_iter()
                .filter_map(|item| normalize_item(&item))
                .collect();
        }
        self.model = self
            .model
            .take()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_allergen(&self, item: &str) -> bool {
        normalize_item(item)
            .map(|item| self.allergies.contains(&item))
            .unwrap_or(false)
    }
}

/// Builder for [`Profile`]. `build()` normalizes and repairs.
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    liked: Vec<String>,
    disliked: Vec<String>,
    allergies: Vec<String>,
    dietary_restrictions: Vec<String>,
    fitness_goals: Vec<String>,
    model: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl ProfileBuilder {
    pub fn liked<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.liked.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn disliked<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disliked.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn allergies<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allergies.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn dietary_restrictions<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dietary_restrictions.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn fitness_goals<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fitness_goals.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Keep the creation time of a profile being edited
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn build(self) -> Profile {
        let now = Utc::now();
        let mut profile = Profile {
            id: LOCAL_PROFILE_ID.to_string(),
            liked: normalize_set(self.liked),
            disliked: normalize_set(self.disliked),
            allergies: normalize_set(self.allergies),
            dietary_restrictions: normalize_set(self.dietary_restrictions),
            fitness_goals: normalize_set(self.fitness_goals),
            model: self.model,
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        };
        profile.normalize();
        profile.repair();
        profile
    }
}

/// Trim and lower-case one item; `None` if nothing is left
pub fn normalize_item(item: &str) -> Option<String> {
    let collapsed = item.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

fn normalize_set(items: Vec<String>) -> BTreeSet<String> {
    items.iter().filter_map(|item| normalize_item(item)).collect()
}

/// Split a comma separated answer into items. "none" (any case) and an empty
/// line both mean no items.
pub fn parse_list(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    trimmed
        .split([',', ';'])
        .filter_map(normalize_item)
        .filter(|item| item != "none")
        .collect()
}
