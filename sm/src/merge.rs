//! Cross-chunk merge and deduplication of epics and stories
//!
//! Each chunk of a large description yields its own epics. Epics sharing a
//! normalized title are folded together, then each epic's stories are
//! deduplicated. Output order is first-seen order of the normalized keys.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{Epic, Story};

/// Insertion-ordered map from normalized key to value
struct OrderedMap<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> OrderedMap<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        let i = *self.index.get(key)?;
        self.entries.get_mut(i)
    }

    fn insert_new(&mut self, key: String, value: T) {
        self.index.insert(key, self.entries.len());
        self.entries.push(value);
    }

    fn into_values(self) -> Vec<T> {
        self.entries
    }
}

/// Merge epics sharing a normalized title and deduplicate their stories
pub fn merge_epics(epics: Vec<Epic>) -> Vec<Epic> {
    debug!(epic_count = epics.len(), "merge_epics: called");
    let mut merged: OrderedMap<Epic> = OrderedMap::new();

    for epic in epics {
        let key = epic.key();
        match merged.get_mut(&key) {
            Some(existing) => {
                debug!(%key, "merge_epics: folding duplicate epic");
                fold_epic(existing, epic);
            }
            None => merged.insert_new(key, epic),
        }
    }

    let result: Vec<Epic> = merged
        .into_values()
        .into_iter()
        .map(|mut epic| {
            epic.stories = dedup_stories(std::mem::take(&mut epic.stories));
            epic
        })
        .collect();

    debug!(epic_count = result.len(), "merge_epics: done");
    result
}

/// Fold `incoming` into `existing`
fn fold_epic(existing: &mut Epic, incoming: Epic) {
    if incoming.description.chars().count() > existing.description.chars().count() {
        existing.description = incoming.description;
    }
    existing.priority = existing.priority.escalate(incoming.priority);
    existing.stories.extend(incoming.stories);
}

/// Deduplicate stories by normalized title
///
/// On a collision the incoming story replaces the current occupant when it
/// has a longer description or more acceptance criteria. The comparison is
/// pairwise against whichever story holds the key at that moment, so with
/// three or more duplicates the winner can depend on input order.
pub fn dedup_stories(stories: Vec<Story>) -> Vec<Story> {
    let mut deduped: OrderedMap<Story> = OrderedMap::new();

    for story in stories {
        let key = story.key();
        match deduped.get_mut(&key) {
            Some(existing) => {
                if is_more_detailed(&story, existing) {
                    debug!(%key, "dedup_stories: replacing with more detailed story");
                    *existing = story;
                }
            }
            None => deduped.insert_new(key, story),
        }
    }

    deduped.into_values()
}

fn is_more_detailed(candidate: &Story, current: &Story) -> bool {
    candidate.description.chars().count() > current.description.chars().count()
        || candidate.acceptance_criteria.len() > current.acceptance_criteria.len()
}
