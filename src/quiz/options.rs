use rand::seq::SliceRandom;
use rand::Rng;

use crate::quiz::pantheon::{Deity, Pantheon};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("a round needs at least one option")]
    NoOptions,
    #[error("requires {required} distractors but only {available} other deities exist")]
    NotEnoughDistractors { required: usize, available: usize },
}

/// Picks `count` answer options for a round: `correct` plus `count - 1` distinct distractors
/// drawn uniformly from the rest of the pantheon, in random display order.
pub fn pick_options<R: Rng + ?Sized>(
    rng: &mut R,
    pantheon: &Pantheon,
    correct: &Deity,
    count: usize,
) -> Result<Vec<Deity>, OptionsError> {
    if count == 0 {
        return Err(OptionsError::NoOptions);
    }

    let others = pantheon.list_excluding(&correct.id);
    if others.len() < count - 1 {
        return Err(OptionsError::NotEnoughDistractors {
            required: count - 1,
            available: others.len(),
        });
    }

    let mut options = others
        .choose_multiple(rng, count - 1)
        .map(|d| (*d).clone())
        .collect::<Vec<_>>();
    options.push(correct.clone());
    // We shuffle the options so the correct one isn't always the last one
    options.shuffle(rng);

    Ok(options)
}
