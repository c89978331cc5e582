//! Numbered result listings.
//!
//! Ordinals printed here are the ones [`crate::resolve::Query::Ordinal`]
//! accepts on the next invocation, so numbering must follow the order the
//! list was cached in.

use std::io::{self, Write};

use crate::inventory::Machine;
use crate::resolve::GroupMatch;

const MISSING: &str = "-";

/// One listing line for `machine` at 1-based `ordinal`.
#[must_use]
pub fn machine_line(ordinal: usize, machine: &Machine) -> String {
    format!(
        "[{ordinal}] Name: {} InstanceId: {} ASG: {} IP_Address: {}",
        machine.name().unwrap_or(MISSING),
        machine.instance_id,
        machine.scaling_group().unwrap_or(MISSING),
        machine.address().unwrap_or(MISSING),
    )
}

/// One listing line for a group member; the group is in the header.
#[must_use]
pub fn member_line(ordinal: usize, machine: &Machine) -> String {
    format!(
        "[{ordinal}] Name: {} InstanceId: {} IP_Address: {}",
        machine.name().unwrap_or(MISSING),
        machine.instance_id,
        machine.address().unwrap_or(MISSING),
    )
}

/// Write a numbered machine list.
///
/// # Errors
///
/// Returns any error from `out`.
pub fn write_machines(out: &mut impl Write, machines: &[Machine]) -> io::Result<()> {
    for (i, machine) in machines.iter().enumerate() {
        writeln!(out, "{}", machine_line(i + 1, machine))?;
    }
    Ok(())
}

/// Write groups under `*** <group> ***` headers, numbering members
/// continuously across groups.
///
/// # Errors
///
/// Returns any error from `out`.
pub fn write_groups(out: &mut impl Write, groups: &[GroupMatch]) -> io::Result<()> {
    let mut ordinal = 1;
    for group in groups {
        writeln!(out, "*** {} ***", group.name)?;
        for machine in &group.members {
            writeln!(out, "{}", member_line(ordinal, machine))?;
            ordinal += 1;
        }
        writeln!(out)?;
    }
    Ok(())
}
