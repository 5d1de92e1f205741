//! WASM bindings for sparsolve.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmSparseSolver } from 'sparsolve';
//!
//! await init();
//!
//! // [[2, 0], [1, 4]]
//! const solver = new WasmSparseSolver("sparse-lu");
//! solver.factorize(2, [0, 1, 1], [0, 0, 1], [2.0, 1.0, 4.0]);
//! const x = solver.solve([2.0, 9.0]); // [1, 2]
//! ```

use wasm_bindgen::prelude::*;

use crate::matrix::CsrMatrix;
use crate::solver::{SolverKind, SparseDirectSolver};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(e: crate::error::SolverError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Direct solver handle for JavaScript callers.
#[wasm_bindgen]
pub struct WasmSparseSolver {
    solver: SparseDirectSolver,
}

#[wasm_bindgen]
impl WasmSparseSolver {
    /// Create a solver using backend `solver` (`"sparse-lu"`, `"dense-lu"`,
    /// `"ilut"`).
    #[wasm_bindgen(constructor)]
    pub fn new(solver: &str) -> Result<WasmSparseSolver, JsValue> {
        let kind: SolverKind = solver.parse().map_err(|e: String| JsValue::from_str(&e))?;
        let mut inner = SparseDirectSolver::new();
        inner.select_direct_solver(kind);
        Ok(WasmSparseSolver { solver: inner })
    }

    /// Factorize the `n x n` matrix given in 0-based coordinate format.
    #[wasm_bindgen]
    pub fn factorize(
        &mut self,
        n: usize,
        rows: &[u32],
        cols: &[u32],
        values: &[f64],
    ) -> Result<(), JsValue> {
        let rows: Vec<usize> = rows.iter().map(|&i| i as usize).collect();
        let cols: Vec<usize> = cols.iter().map(|&j| j as usize).collect();
        let a = CsrMatrix::from_coordinates(n, n, &rows, &cols, values).map_err(to_js)?;
        self.solver.factorize(a).map_err(to_js)
    }

    /// Solve with the current factorization, returning a new array.
    #[wasm_bindgen]
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, JsValue> {
        let mut x = rhs.to_vec();
        self.solver.solve(&mut x).map_err(to_js)?;
        Ok(x)
    }

    /// Refine solutions iteratively after each solve.
    #[wasm_bindgen]
    pub fn set_refinement(&mut self, refine: bool) {
        if refine {
            self.solver.refine_solution();
        } else {
            self.solver.do_not_refine_solution();
        }
    }

    /// Name of the selected backend.
    #[wasm_bindgen(getter)]
    pub fn backend(&self) -> String {
        self.solver.direct_solver().to_string()
    }

    /// Size of the factorized matrix (0 before `factorize`).
    #[wasm_bindgen(getter)]
    pub fn n(&self) -> usize {
        self.solver.n()
    }

    #[wasm_bindgen(getter)]
    pub fn factorized(&self) -> bool {
        self.solver.is_factorized()
    }

    /// Number of stored factor entries.
    #[wasm_bindgen(getter)]
    pub fn memory_used(&self) -> usize {
        self.solver.memory_used()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    crate::VERSION.to_string()
}
