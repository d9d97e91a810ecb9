//! Per-record visibility filtering.
//!
//! A record with no whitelist is visible to every authenticated principal.
//! Otherwise the principal's email must be listed, or one of its groups.

use kubebrowser_core::ConfigRecord;
use tracing::debug;

use crate::identity::Identity;

/// Returns true if `identity` may see `record`.
#[must_use]
pub fn permits(record: &ConfigRecord, identity: &Identity) -> bool {
    let Some(whitelist) = record.whitelist() else {
        return true;
    };

    if whitelist.permits_user(&identity.email) {
        debug!(record = %record.name, email = %identity.email, "user whitelisted");
        return true;
    }

    if let Some(group) = whitelist.matching_group(&identity.groups) {
        debug!(record = %record.name, group, "group whitelisted");
        return true;
    }

    false
}

/// Keeps the records `identity` may see, preserving input order.
pub fn visible<'a, I>(records: I, identity: &Identity) -> Vec<&'a ConfigRecord>
where
    I: IntoIterator<Item = &'a ConfigRecord>,
{
    records
        .into_iter()
        .filter(|record| permits(record, identity))
        .collect()
}
