//! Multi-key stable sort.

use plateframe_types::{PlateFrame, Result};

/// Sort direction for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort specification: column index + direction.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub column: usize,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(column: usize) -> Self {
        SortKey {
            column,
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(column: usize) -> Self {
        SortKey {
            column,
            order: SortOrder::Descending,
        }
    }
}

/// Stable sort by the given keys. Missing values sort last under ascending
/// order.
pub fn sort(table: &PlateFrame, keys: &[SortKey]) -> Result<PlateFrame> {
    if table.num_rows() <= 1 || keys.is_empty() {
        return Ok(table.clone());
    }

    let mut indices: Vec<usize> = (0..table.num_rows()).collect();
    indices.sort_by(|&a, &b| {
        for key in keys {
            let va = table.column(key.column).get(a);
            let vb = table.column(key.column).get(b);
            let cmp = match key.order {
                SortOrder::Ascending => va.compare(&vb),
                SortOrder::Descending => va.compare(&vb).reverse(),
            };
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });

    table.take(&indices)
}

/// Ascending sort by named columns.
pub fn sort_by_names(table: &PlateFrame, names: &[&str]) -> Result<PlateFrame> {
    let keys: Vec<SortKey> = names
        .iter()
        .map(|name| table.column_index(name).map(SortKey::asc))
        .collect::<Result<_>>()?;
    sort(table, &keys)
}
