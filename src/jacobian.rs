use crate::debug::format_f64_vec;
use crate::equation_system::EquationSystem;
use crate::lf_network::LfNetwork;
use anyhow::{format_err, Result};
use rlu::LU;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;
use spsolve::FactorSolver;
use std::collections::BTreeMap;

/// Sparse LU factorization and solve backend.
pub type LuSolver = dyn FactorSolver<usize, f64, LU<f64>>;

/// Sparse Jacobian of an equation system at a given state.
pub struct JacobianMatrix {
    matrix: CSC<usize, f64>,
}

impl JacobianMatrix {
    /// Assembles J = df/dx, with entries only where a term references a
    /// variable.
    pub fn build(system: &EquationSystem, network: &LfNetwork, x: &[f64]) -> Result<Self> {
        let n = system.size();

        // column-major order, duplicates summed
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (row, col, value) in system.jacobian_triplets(network, x) {
            *entries.entry((col, row)).or_insert(0.0) += value;
        }

        let mut rowidx = Vec::with_capacity(entries.len());
        let mut colidx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for ((col, row), value) in entries {
            rowidx.push(row);
            colidx.push(col);
            values.push(value);
        }

        let matrix = Coo::new(n, n, rowidx, colidx, values)?.to_csc();
        Ok(Self { matrix })
    }

    pub fn size(&self) -> usize {
        self.matrix.cols()
    }

    /// Factorizes the matrix with `solver`.
    ///
    /// Fails when a row or a column holds no non-zero value, or when the
    /// factorization meets a numerically zero pivot.
    pub fn decompose_lu<'a>(&self, solver: &'a LuSolver) -> Result<LuDecomposition<'a>> {
        let n = self.size();
        let mut row_filled = vec![false; n];
        let mut col_filled = vec![false; n];
        let colptr = self.matrix.colptr();
        let rowidx = self.matrix.rowidx();
        let values = self.matrix.values();
        for col in 0..n {
            for k in colptr[col]..colptr[col + 1] {
                if values[k] != 0.0 && values[k].is_finite() {
                    row_filled[rowidx[k]] = true;
                    col_filled[col] = true;
                }
            }
        }
        if let Some(row) = row_filled.iter().position(|filled| !filled) {
            return Err(format_err!("singular jacobian: row {} is empty", row));
        }
        if let Some(col) = col_filled.iter().position(|filled| !filled) {
            return Err(format_err!("singular jacobian: column {} is empty", col));
        }

        let lu = solver.factor(n, rowidx, colptr, values)?;
        Ok(LuDecomposition {
            size: n,
            lu,
            solver,
        })
    }
}

/// LU factors of a Jacobian, valid for the solves of one Newton-Raphson
/// iteration and released when dropped.
pub struct LuDecomposition<'a> {
    size: usize,
    lu: LU<f64>,
    solver: &'a LuSolver,
}

impl LuDecomposition<'_> {
    /// Solves J.x = b in place from the factors.
    pub fn solve(&self, b: &mut [f64]) -> Result<()> {
        self.solver.solve(&self.lu, b, false)?;
        if b.iter().any(|v| !v.is_finite()) {
            log::trace!("dx: {}", format_f64_vec(b));
            return Err(format_err!("singular jacobian: non finite solution"));
        }
        Ok(())
    }
}

impl Drop for LuDecomposition<'_> {
    fn drop(&mut self) {
        log::trace!("LU decomposition of {0}x{0} jacobian released", self.size);
    }
}
