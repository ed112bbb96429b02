//! Due-card selection for a review session.
//!
//! Learning-phase cards come first because their feedback loop is minutes,
//! not days. Within a phase the most overdue card comes first.

use crate::CardState;
use chrono::{DateTime, Utc};

/// Cards due at `now`, in presentation order
///
/// Works over any card identity (`&CardKey`, `&str`, an id number...). The
/// result is rebuilt from the input on every call; equal entries keep their
/// input order.
pub fn select_due<'a, I, C>(cards: C, now: DateTime<Utc>) -> impl Iterator<Item = &'a I>
where
    I: ?Sized + 'a,
    C: IntoIterator<Item = (&'a I, &'a CardState)>,
{
    let mut due: Vec<(&'a I, &'a CardState)> = cards
        .into_iter()
        .filter(|(_, state)| state.is_due(now))
        .collect();

    due.sort_by_key(|(_, state)| (!state.is_learning, state.due_at));

    tracing::debug!("Selected {} due cards", due.len());
    due.into_iter().map(|(id, _)| id)
}
