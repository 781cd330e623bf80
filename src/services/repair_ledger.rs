use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::ServiceError,
    models::{
        inventory_adjustment::AdjustmentType,
        repair_slip::{RepairItem, RepairStatus},
    },
};

/// One maintenance update against a repair item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairProgress {
    pub delta_repaired: u32,
    pub new_status: RepairStatus,
    pub notes: Option<String>,
}

/// Units that left the outstanding pool in the transition that emptied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub adjustment_type: AdjustmentType,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    pub item: RepairItem,
    /// Set only when this update brought `quantity_remaining` to zero.
    pub resolution: Option<Resolution>,
}

/// Records maintenance progress on a repair item without touching the input.
///
/// NOTE: only `completed` (and `scrapped`) updates move units from remaining to
/// repaired. An `in-progress` update with a delta changes the status and
/// nothing else. Whether partial progress should instead move units
/// proportionally is an open product question; keep this behaviour until it
/// is answered.
pub fn record_progress(
    item: &RepairItem,
    progress: &RepairProgress,
    now: DateTime<Utc>,
) -> Result<ProgressOutcome, ServiceError> {
    if progress.delta_repaired == 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "Repair progress on {} must cover at least one unit",
            item.item_ref
        )));
    }
    if progress.delta_repaired > item.quantity_remaining {
        return Err(ServiceError::InvalidQuantity(format!(
            "Repair progress of {} on {} exceeds the {} unit(s) remaining",
            progress.delta_repaired, item.item_ref, item.quantity_remaining
        )));
    }

    let mut next = item.clone();
    if let Some(notes) = &progress.notes {
        next.notes = Some(notes.clone());
    }

    let mut resolution = None;
    match progress.new_status {
        RepairStatus::Completed | RepairStatus::Scrapped => {
            next.quantity_remaining -= progress.delta_repaired;
            next.quantity_repaired += progress.delta_repaired;

            if next.quantity_remaining == 0 {
                next.repair_status = progress.new_status;
                next.completed_date = Some(now);
                resolution = Some(Resolution {
                    adjustment_type: match progress.new_status {
                        RepairStatus::Scrapped => AdjustmentType::Scrapped,
                        _ => AdjustmentType::RepairCompleted,
                    },
                    quantity: progress.delta_repaired,
                });
            } else {
                // batch done, item still has units outstanding
                next.repair_status = RepairStatus::InProgress;
            }
        }
        RepairStatus::InProgress | RepairStatus::Pending => {
            next.repair_status = progress.new_status;
        }
    }

    debug_assert_eq!(next.quantity_repaired + next.quantity_remaining, next.quantity);
    Ok(ProgressOutcome {
        item: next,
        resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn item(quantity: u32) -> RepairItem {
        RepairItem::manual("TRUSS-3M", "Box truss 3m", quantity, dec!(45)).unwrap()
    }

    fn progress(delta: u32, status: RepairStatus) -> RepairProgress {
        RepairProgress {
            delta_repaired: delta,
            new_status: status,
            notes: None,
        }
    }

    #[test]
    fn in_progress_does_not_move_quantity() {
        let outcome =
            record_progress(&item(5), &progress(5, RepairStatus::InProgress), Utc::now()).unwrap();
        assert_eq!(outcome.item.quantity_remaining, 5);
        assert_eq!(outcome.item.quantity_repaired, 0);
        assert_eq!(outcome.item.repair_status, RepairStatus::InProgress);
        assert!(outcome.resolution.is_none());
    }

    #[test]
    fn completed_moves_delta_and_resolves() {
        let started =
            record_progress(&item(5), &progress(5, RepairStatus::InProgress), Utc::now()).unwrap();
        let outcome =
            record_progress(&started.item, &progress(5, RepairStatus::Completed), Utc::now())
                .unwrap();
        assert_eq!(outcome.item.quantity_remaining, 0);
        assert_eq!(outcome.item.quantity_repaired, 5);
        assert_eq!(outcome.item.repair_status, RepairStatus::Completed);
        assert!(outcome.item.completed_date.is_some());
        assert_eq!(
            outcome.resolution,
            Some(Resolution {
                adjustment_type: AdjustmentType::RepairCompleted,
                quantity: 5,
            })
        );
    }

    #[test]
    fn partial_completion_keeps_item_in_progress() {
        let outcome =
            record_progress(&item(5), &progress(2, RepairStatus::Completed), Utc::now()).unwrap();
        assert_eq!(outcome.item.quantity_remaining, 3);
        assert_eq!(outcome.item.quantity_repaired, 2);
        assert_eq!(outcome.item.repair_status, RepairStatus::InProgress);
        assert!(outcome.resolution.is_none());

        let last =
            record_progress(&outcome.item, &progress(3, RepairStatus::Completed), Utc::now())
                .unwrap();
        assert_eq!(last.resolution.map(|r| r.quantity), Some(3));
    }

    #[test]
    fn scrapped_resolution_is_typed_as_scrapped() {
        let outcome =
            record_progress(&item(2), &progress(2, RepairStatus::Scrapped), Utc::now()).unwrap();
        assert_eq!(outcome.item.repair_status, RepairStatus::Scrapped);
        assert_eq!(
            outcome.resolution.map(|r| r.adjustment_type),
            Some(AdjustmentType::Scrapped)
        );
    }

    #[test]
    fn zero_or_excess_delta_is_invalid() {
        let item = item(3);
        assert_matches!(
            record_progress(&item, &progress(0, RepairStatus::Completed), Utc::now()),
            Err(ServiceError::InvalidQuantity(_))
        );
        assert_matches!(
            record_progress(&item, &progress(4, RepairStatus::InProgress), Utc::now()),
            Err(ServiceError::InvalidQuantity(_))
        );
        assert_eq!(item.quantity_remaining, 3);
    }

    #[test]
    fn resolved_item_accepts_no_further_progress() {
        let done =
            record_progress(&item(1), &progress(1, RepairStatus::Completed), Utc::now()).unwrap();
        assert_matches!(
            record_progress(&done.item, &progress(1, RepairStatus::Completed), Utc::now()),
            Err(ServiceError::InvalidQuantity(_))
        );
    }
}
