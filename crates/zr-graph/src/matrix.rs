//! Matrix expansion (spec.md §4.5 rule 2): a task with matrix
//! `{axis_i -> values_i}` yields the Cartesian product of all axis values,
//! one `MatrixCoordinate` per combination. Kept purely combinatorial here
//! per Design Note §9 ("keep the expansion in the Graph Builder, not
//! sprinkled into the scheduler").

use std::collections::BTreeMap;

use zr_task_id::MatrixCoordinate;

/// Expands `axes` into every coordinate in the Cartesian product, in a
/// deterministic order (axes sorted by name, values in declaration order
/// within each axis). A task with no matrix yields a single empty
/// coordinate.
pub fn expand(axes: &BTreeMap<String, Vec<String>>) -> Vec<MatrixCoordinate> {
    if axes.is_empty() {
        return vec![MatrixCoordinate::empty()];
    }
    let axis_names: Vec<&String> = axes.keys().collect();
    let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
    for name in &axis_names {
        let values = &axes[*name];
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.push((name.to_string(), value.clone()));
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
        .into_iter()
        .map(MatrixCoordinate::from_pairs)
        .collect()
}
