use std::path::Path;

use sprs::{CsMat, TriMat};

use crate::runtime::Error;

/// Read a Matrix Market file into CSR form (rows are the outer dimension)
pub fn read_mtx(path: &Path) -> anyhow::Result<CsMat<f64>> {
    crate::runtime::require_nonempty(path)?;
    let tri: TriMat<f64> = sprs::io::read_matrix_market(path)
        .map_err(|e| Error::file_not_valid(path, Some(format!("{:?}", e))))?;
    Ok(tri.to_csr())
}

pub fn write_mtx(path: &Path, mat: &CsMat<f64>) -> anyhow::Result<()> {
    sprs::io::write_matrix_market(path, mat)?;
    Ok(())
}

/// Keep the given rows, in the given order
pub fn subset_rows(mat: &CsMat<f64>, rows: &[usize]) -> CsMat<f64> {
    let mut tri = TriMat::new((rows.len(), mat.cols()));
    for (new_row, &old_row) in rows.iter().enumerate() {
        if let Some(row) = mat.outer_view(old_row) {
            for (col, &value) in row.iter() {
                tri.add_triplet(new_row, col, value);
            }
        }
    }
    tri.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MTX: &str = "%%MatrixMarket matrix coordinate integer general\n\
%comment\n\
4 3 5\n\
1 1 1\n\
2 2 3\n\
3 1 2\n\
3 3 1\n\
4 2 7\n";

    #[test]
    fn test_subset_rows_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path_in = dir.path().join("matrix.mtx");
        let path_out = dir.path().join("subset.mtx");
        std::fs::write(&path_in, MTX).unwrap();

        let mat = read_mtx(&path_in).unwrap();
        assert_eq!(mat.shape(), (4, 3));

        let sub = subset_rows(&mat, &[0, 2]);
        assert_eq!(sub.shape(), (2, 3));
        assert_eq!(sub.nnz(), 3);
        assert_eq!(sub.get(0, 0), Some(&1.0));
        assert_eq!(sub.get(1, 0), Some(&2.0));
        assert_eq!(sub.get(1, 2), Some(&1.0));
        assert_eq!(sub.get(1, 1), None);

        write_mtx(&path_out, &sub).unwrap();
        let reread = read_mtx(&path_out).unwrap();
        assert_eq!(reread.shape(), (2, 3));
        assert_eq!(reread.get(1, 2), Some(&1.0));
    }

    #[test]
    fn test_empty_subset_keeps_columns() {
        let mut tri = TriMat::new((2, 5));
        tri.add_triplet(1, 4, 2.0);
        let mat: CsMat<f64> = tri.to_csr();
        let sub = subset_rows(&mat, &[]);
        assert_eq!(sub.shape(), (0, 5));
    }
}
