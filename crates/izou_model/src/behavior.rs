//! Output priority partitions.
//!
//! The creator of an event may attach a [`BehaviorController`] that sorts the
//! registered output plugins into integer priority buckets. Buckets are
//! visited in descending key order. Plugins the controller does not mention
//! belong to the implicit neutral bucket `0`, after any plugin explicitly
//! placed there.

use std::collections::BTreeMap;

use hashbrown::HashSet;
use izou_identity::Identification;

/// Mapping from priority bucket to the plugins in it.
pub type PriorityPartition = BTreeMap<i32, Vec<Identification>>;

/// Decides the order in which output plugins receive an event.
pub trait BehaviorController: Send + Sync {
    /// Partitions the registered output plugins into priority buckets.
    fn output_plugin_behavior(&self, plugins: &[Identification]) -> PriorityPartition;
}

impl<F> BehaviorController for F
where
    F: Fn(&[Identification]) -> PriorityPartition + Send + Sync,
{
    fn output_plugin_behavior(&self, plugins: &[Identification]) -> PriorityPartition {
        self(plugins)
    }
}

/// Resolves a partition into a flat delivery order.
///
/// - Buckets are visited from the highest key to the lowest.
/// - A plugin listed in several buckets is delivered once, in the first
///   (highest) bucket it appears in.
/// - Identities that are not in `plugins` are ignored.
/// - Plugins never mentioned are delivered as part of bucket `0`, after its
///   explicit members, in the order they appear in `plugins`.
#[must_use]
pub fn resolve_delivery_order(
    plugins: &[Identification],
    partition: &PriorityPartition,
) -> Vec<Identification> {
    let registered: HashSet<&Identification> = plugins.iter().collect();
    let mentioned: HashSet<&Identification> = partition
        .values()
        .flatten()
        .filter(|id| registered.contains(id))
        .collect();

    let mut order = Vec::with_capacity(plugins.len());
    let mut seen: HashSet<Identification> = HashSet::new();
    let mut neutral_done = false;

    let push_unmentioned = |order: &mut Vec<Identification>, seen: &mut HashSet<Identification>| {
        for plugin in plugins {
            if !mentioned.contains(plugin) && seen.insert(plugin.clone()) {
                order.push(plugin.clone());
            }
        }
    };

    for (&priority, bucket) in partition.iter().rev() {
        if priority < 0 && !neutral_done {
            push_unmentioned(&mut order, &mut seen);
            neutral_done = true;
        }
        for plugin in bucket {
            if registered.contains(plugin) && seen.insert(plugin.clone()) {
                order.push(plugin.clone());
            }
        }
        if priority == 0 {
            push_unmentioned(&mut order, &mut seen);
            neutral_done = true;
        }
    }

    if !neutral_done {
        push_unmentioned(&mut order, &mut seen);
    }

    order
}
