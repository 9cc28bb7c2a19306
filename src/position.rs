//! Ordered positions within containers.
//!
//! Columns order their tasks, tasks order their checklists and checklists
//! order their items by an integer `position`. New items are appended at
//! `max + 1`; removals leave gaps; a drag-and-drop move is submitted as a
//! batch of [`Placement`]s holding the complete renumbering of every
//! affected container.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Zero-based display order within a container.
pub type Position = i64;

/// Largest position a store accepts, from a batch or an append.
pub const MAX_POSITION: Position = i32::MAX as Position;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("batch contains no placements")]
    EmptyBatch,
    #[error("item {0} appears more than once in the batch")]
    DuplicateItem(String),
    #[error("item {id} has negative position {position}")]
    NegativePosition { id: String, position: Position },
    #[error("item {id} has position {position}, above the maximum of {max}", max = MAX_POSITION)]
    PositionTooLarge { id: String, position: Position },
    #[error("container is full: no position after {0}")]
    ContainerFull(Position),
    #[error("item {0} is not in the source container")]
    UnknownItem(String),
    #[error("container {container} is not densely numbered: expected position {expected}, found {found}")]
    NotDense {
        container: String,
        expected: Position,
        found: Position,
    },
}

/// One `(item, container, position)` assignment of a batch reposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    #[serde(rename = "columnId", alias = "containerId")]
    pub container_id: String,
    pub position: Position,
}

impl Placement {
    pub fn new(id: impl Into<String>, container_id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            container_id: container_id.into(),
            position,
        }
    }
}

/// Whether a store re-checks container density after applying a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityPolicy {
    /// Apply the submitted renumbering as-is.
    #[default]
    Permissive,
    /// Reject (and roll back) a batch that leaves a touched container
    /// numbered other than `0..N-1`.
    Strict,
}

/// Position for a new item given the container's current maximum.
pub fn append_position(max: Option<Position>) -> Result<Position, PositionError> {
    match max {
        None => Ok(0),
        Some(m) => m
            .checked_add(1)
            .filter(|next| *next <= MAX_POSITION)
            .ok_or(PositionError::ContainerFull(m)),
    }
}

/// Position for a new item appended after `positions`.
pub fn next_position<I>(positions: I) -> Result<Position, PositionError>
where
    I: IntoIterator<Item = Position>,
{
    append_position(positions.into_iter().max())
}

/// Structural checks applied before any placement is written.
pub fn validate_batch(placements: &[Placement]) -> Result<(), PositionError> {
    if placements.is_empty() {
        return Err(PositionError::EmptyBatch);
    }

    let mut seen = HashSet::with_capacity(placements.len());
    for placement in placements {
        if placement.position < 0 {
            return Err(PositionError::NegativePosition {
                id: placement.id.clone(),
                position: placement.position,
            });
        }
        if placement.position > MAX_POSITION {
            return Err(PositionError::PositionTooLarge {
                id: placement.id.clone(),
                position: placement.position,
            });
        }
        if !seen.insert(placement.id.as_str()) {
            return Err(PositionError::DuplicateItem(placement.id.clone()));
        }
    }
    Ok(())
}

/// Verify that `positions` is exactly `0..N-1` in some order.
pub fn check_dense<I>(container: &str, positions: I) -> Result<(), PositionError>
where
    I: IntoIterator<Item = Position>,
{
    let mut sorted: Vec<Position> = positions.into_iter().collect();
    sorted.sort_unstable();
    for (expected, found) in (0..).zip(sorted) {
        if found != expected {
            return Err(PositionError::NotDense {
                container: container.to_string(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// An item that lives at a position inside a container.
pub trait Positioned {
    fn item_id(&self) -> &str;
    fn container_id(&self) -> &str;
    fn position(&self) -> Position;
    fn place(&mut self, container_id: &str, position: Position);
}

/// Apply every placement to `items`. Returns the id of the first placement
/// whose item is missing, in which case `items` is left untouched.
pub fn apply_placements<T: Positioned>(
    items: &mut [T],
    placements: &[Placement],
) -> Result<(), String> {
    let mut targets = Vec::with_capacity(placements.len());
    for placement in placements {
        match items.iter().position(|item| item.item_id() == placement.id) {
            Some(index) => targets.push(index),
            None => return Err(placement.id.clone()),
        }
    }
    for (index, placement) in targets.into_iter().zip(placements) {
        items[index].place(&placement.container_id, placement.position);
    }
    Ok(())
}

/// Remove an item without renumbering its former neighbors.
pub fn remove<T: Positioned>(items: &mut Vec<T>, id: &str) -> Option<T> {
    let index = items.iter().position(|item| item.item_id() == id)?;
    Some(items.remove(index))
}

/// Items of one container in display order.
pub fn ordered<'a, T: Positioned>(items: &'a [T], container_id: &str) -> Vec<&'a T> {
    let mut in_container: Vec<&T> = items
        .iter()
        .filter(|item| item.container_id() == container_id)
        .collect();
    in_container.sort_by_key(|item| item.position());
    in_container
}

/// Current display order of one container, as item ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOrder {
    pub container_id: String,
    pub item_ids: Vec<String>,
}

impl ContainerOrder {
    pub fn new(container_id: impl Into<String>, item_ids: Vec<String>) -> Self {
        Self {
            container_id: container_id.into(),
            item_ids,
        }
    }

    fn renumber(&self) -> impl Iterator<Item = Placement> + '_ {
        (0..).zip(&self.item_ids).map(move |(position, id)| {
            Placement::new(id.clone(), self.container_id.clone(), position)
        })
    }
}

/// Compute the batch for a drag-and-drop move of `item_id` out of `source`
/// into `dest` (or within `source` when `dest` is `None` or the same
/// container) at `to_index`, clamped to the destination length.
///
/// The source container is renumbered from zero; so is the destination when
/// it differs. Source placements come first.
pub fn plan_move(
    source: &ContainerOrder,
    dest: Option<&ContainerOrder>,
    item_id: &str,
    to_index: usize,
) -> Result<Vec<Placement>, PositionError> {
    let mut source = source.clone();
    let from = source
        .item_ids
        .iter()
        .position(|id| id == item_id)
        .ok_or_else(|| PositionError::UnknownItem(item_id.to_string()))?;
    let moved = source.item_ids.remove(from);

    let dest = dest.filter(|d| d.container_id != source.container_id);
    match dest {
        None => {
            let index = to_index.min(source.item_ids.len());
            source.item_ids.insert(index, moved);
            Ok(source.renumber().collect())
        }
        Some(dest) => {
            let mut dest = dest.clone();
            dest.item_ids.retain(|id| id != &moved);
            let index = to_index.min(dest.item_ids.len());
            dest.item_ids.insert(index, moved);
            Ok(source.renumber().chain(dest.renumber()).collect())
        }
    }
}
