// ABOUTME: Labels berth puts on every container it creates.
// ABOUTME: Teardown and status find a stack's containers by these, never by name.

use crate::runtime::ContainerFilters;
use crate::types::StackName;

pub const MANAGED: &str = "berth.managed";
pub const STACK: &str = "berth.stack";
pub const SERVICE: &str = "berth.service";
pub const ROLE: &str = "berth.role";

pub const ROLE_SERVICE: &str = "service";
pub const ROLE_MIGRATION: &str = "migration";

/// Every container belonging to `stack`, running or not.
pub fn stack_filter(stack: &StackName) -> ContainerFilters {
    ContainerFilters {
        all: true,
        ..Default::default()
    }
    .with_label(MANAGED, "true")
    .with_label(STACK, stack.as_str())
}
