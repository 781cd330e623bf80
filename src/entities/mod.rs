//! Table mappings for the stored aggregates.
//!
//! Each aggregate is kept whole as a JSON document next to the columns that
//! are queried or constrained: document numbers, link ids, the optimistic
//! `version` and the invoice's payment status.

pub mod condition_report;
pub mod damage_invoice;
pub mod document_sequence;
pub mod inventory_adjustment;
pub mod repair_slip;
