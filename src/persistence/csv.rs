//! CSV export of similar pairs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::error::PersistenceResult;
use crate::ids::CellId;
use crate::pairs::PairsView;

/// Write one `cellId0,cellId1,similarity` line per stored pair, with global
/// cell ids, cells in local id order and pairs in stored order.
pub fn write_csv<V, W>(view: &V, w: &mut W) -> PersistenceResult<()>
where
    V: PairsView + ?Sized,
    W: Write,
{
    writeln!(w, "cellId0,cellId1,similarity")?;
    for cell0 in 0..view.cell_count() as CellId {
        let global0 = view.global_cell_id(cell0);
        for pair in view.pairs(cell0).iter() {
            writeln!(
                w,
                "{},{},{}",
                global0,
                view.global_cell_id(pair.cell_id),
                pair.similarity
            )?;
        }
    }
    Ok(())
}

/// [`write_csv`] into a new or truncated file.
pub fn export_csv<V>(view: &V, path: impl AsRef<Path>) -> PersistenceResult<()>
where
    V: PairsView + ?Sized,
{
    let mut w = BufWriter::new(File::create(path)?);
    write_csv(view, &mut w)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CellSet, GeneSet};
    use crate::pairs::{AdmissionPolicy, SimilarPairs};

    #[test]
    fn writes_global_ids() {
        let cells = CellSet::from_sorted(vec![10, 20, 30]).unwrap();
        let mut s = SimilarPairs::new(2, GeneSet::full(3), cells, AdmissionPolicy::LinearScan).unwrap();
        s.add(0, 2, 0.5);
        s.add_unsymmetric(1, 0, 0.25);
        s.sort();
        let mut out = Vec::new();
        write_csv(&s, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "cellId0,cellId1,similarity\n10,30,0.5\n20,10,0.25\n30,10,0.5\n"
        );
    }
}
