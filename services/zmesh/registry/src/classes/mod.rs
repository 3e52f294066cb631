//! Built-in command class tables.
//!
//! These are data, not logic: each module describes one command class as a
//! set of [`CommandDef`]s over the schema vocabulary. The full device
//! catalogue runs to hundreds of classes; the set shipped here covers the
//! classes the node itself exchanges plus representatives of every payload
//! shape the codec supports.

use crate::CommandDef;

pub mod application_status;
pub mod association;
pub mod door_lock;
pub mod entry_control;
pub mod meter_tbl_push;
pub mod network_inclusion;
pub mod schedule;
pub mod switch_multilevel;

/// Every built-in command definition.
pub fn defs() -> Vec<CommandDef> {
    let mut defs = Vec::new();
    defs.extend(application_status::defs());
    defs.extend(association::defs());
    defs.extend(door_lock::defs());
    defs.extend(entry_control::defs());
    defs.extend(meter_tbl_push::defs());
    defs.extend(network_inclusion::defs());
    defs.extend(schedule::defs());
    defs.extend(switch_multilevel::defs());
    defs
}
