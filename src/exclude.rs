//! Exclusion-class filters.
//!
//! A node is admissible under an exclusion class when none of the class's
//! excluded bits appear in the node's class data.

pub fn node_filters(
    num_nodes: usize,
    class_data: &[u32],
    excludable_classes: &[u32],
) -> Vec<Vec<bool>> {
    excludable_classes
        .iter()
        .map(|&mask| {
            (0..num_nodes)
                .map(|node| class_data[node] & mask == 0)
                .collect()
        })
        .collect()
}
