//! `execif` guard evaluation
//!
//! A guard is a conjunction of OR-groups. Groups are evaluated left to right
//! and each group stops at its first true predicate; the whole guard stops at
//! its first false group. Value predicates are sampled once; existence
//! predicates wait up to their timeout. A false predicate is never an error.

use tracing::debug;

use crate::assertion::Assertions;
use crate::driver::Driver;
use crate::error::Result;
use crate::scenario::{Guard, Predicate};

/// Evaluate a guard. An empty guard holds; an empty group does not.
pub async fn evaluate<D: Driver>(assertions: &Assertions<'_, D>, guard: &Guard) -> Result<bool> {
    for (index, group) in guard.0.iter().enumerate() {
        if !any(assertions, group).await? {
            debug!(group = index, "execif group is false");
            return Ok(false);
        }
    }
    Ok(true)
}

async fn any<D: Driver>(assertions: &Assertions<'_, D>, group: &[Predicate]) -> Result<bool> {
    for predicate in group {
        let holds = match predicate {
            Predicate::Bool(value) => *value.get()?,
            Predicate::Assert(assertion) => assertions.holds(assertion).await?,
        };
        if holds {
            return Ok(true);
        }
    }
    Ok(false)
}
