//! Order engine
//!
//! Computes the orders that place a task at a position in a list while
//! rewriting as few other tasks as possible. Distinct neighbours get the
//! midpoint; only when the task lands inside a run of equal (or absent)
//! orders is that run renumbered.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::UnorderedPosition;
use crate::task::{Task, TaskId};

/// Gap between consecutive orders when there is nothing to interpolate to
pub const ORDER_STEP: f64 = 10.0;

/// New order for one task
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderChange {
    pub id: TaskId,
    pub order: f64,
}

/// Orders computed for a drop position
#[derive(Debug, Clone, PartialEq)]
pub struct Reorder {
    /// Order of the moved task
    pub moved: f64,
    /// `(index, order)` for every list entry that must be rewritten
    pub renumbered: Vec<(usize, f64)>,
}

/// Compute orders for inserting at `new_pos` into `orders`.
///
/// `orders` is the target list sorted, without the moved task. `new_pos`
/// is clamped to the list length.
pub fn reorder(orders: &[Option<f64>], new_pos: usize) -> Reorder {
    let len = orders.len();
    let new_pos = new_pos.min(len);
    let fixed = |moved: f64| Reorder {
        moved,
        renumbered: Vec::new(),
    };

    if len == 0 {
        return fixed(0.0);
    }
    if new_pos == 0 {
        return fixed(orders[0].map_or(0.0, |first| first - ORDER_STEP));
    }
    let left = orders[new_pos - 1];
    if new_pos == len {
        if let Some(last) = left {
            return fixed(last + ORDER_STEP);
        }
    }
    let right = orders.get(new_pos).copied().flatten();
    match (left, right) {
        (Some(left), Some(right)) if left != right => return fixed((left + right) / 2.0),
        (Some(left), None) if new_pos < len => return fixed(left + ORDER_STEP),
        _ => {}
    }

    // Renumber the run of entries equal to the left neighbour
    let mut prev = new_pos - 1;
    let prev_idx = loop {
        if orders[prev] != left {
            break Some(prev);
        }
        if prev == 0 {
            break None;
        }
        prev -= 1;
    };
    let mut next_idx = new_pos;
    while next_idx < len && orders[next_idx] == left {
        next_idx += 1;
    }

    let start = prev_idx.map_or(0, |prev| prev + 1);
    let end = if left.is_none() && next_idx == len {
        // Absent orders after the drop point already sort last
        new_pos
    } else {
        next_idx
    };
    let ending = orders.get(next_idx).copied().flatten();
    let slots = next_idx as f64 - prev_idx.map_or(-1.0, |prev| prev as f64) + 1.0;

    let starting = match (prev_idx.and_then(|prev| orders[prev]), ending) {
        (Some(starting), _) => starting,
        (None, Some(ending)) if ending <= 0.0 => ending - ORDER_STEP * slots,
        (None, _) => 0.0,
    };
    let increment = match ending {
        Some(ending) => (ending - starting) / slots,
        None => ORDER_STEP,
    };

    let mut value = starting;
    let mut moved = None;
    let mut renumbered = Vec::with_capacity(end.saturating_sub(start));
    for index in start..end {
        if index == new_pos {
            value += increment;
            moved = Some(value);
        }
        value += increment;
        renumbered.push((index, value));
    }
    if moved.is_none() && new_pos >= end {
        value += increment;
        moved = Some(value);
    }

    Reorder {
        moved: moved.unwrap_or(0.0),
        renumbered,
    }
}

/// Modify-set for moving `task` to `new_pos` in `list`.
///
/// `list` is the target list sorted, without `task`. The moved task comes
/// first in the result.
pub fn compute_reorder(task: &Task, list: &[&Task], new_pos: usize) -> Vec<OrderChange> {
    let orders: Vec<Option<f64>> = list.iter().map(|task| task.order()).collect();
    let Reorder { moved, renumbered } = reorder(&orders, new_pos);
    std::iter::once(OrderChange {
        id: task.id(),
        order: moved,
    })
    .chain(renumbered.into_iter().map(|(index, order)| OrderChange {
        id: list[index].id(),
        order,
    }))
    .collect()
}

/// List order: by order, tasks without one placed per `unordered`, then by
/// text. Path and line settle the rest
pub fn compare(a: &Task, b: &Task, unordered: UnorderedPosition) -> Ordering {
    let by_order = match (a.order(), b.order()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (None, None) => Ordering::Equal,
        (Some(_), None) => match unordered {
            UnorderedPosition::Last => Ordering::Less,
            UnorderedPosition::First => Ordering::Greater,
        },
        (None, Some(_)) => match unordered {
            UnorderedPosition::Last => Ordering::Greater,
            UnorderedPosition::First => Ordering::Less,
        },
    };
    by_order
        .then_with(|| a.text().cmp(b.text()))
        .then_with(|| a.path().cmp(b.path()))
        .then_with(|| a.line().cmp(&b.line()))
}

pub fn sort_tasks(tasks: &mut [&Task], unordered: UnorderedPosition) {
    tasks.sort_by(|a, b| compare(a, b, unordered));
}
