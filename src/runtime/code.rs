//! Compiled expressions and their evaluation.

use crate::core::error::{JitError, JitResult};
use crate::core::session::CompileStats;
use crate::runtime::memory::ExecutableBlock;

/// A compiled expression owning its executable memory.
///
/// Evaluate it any number of times, from any number of threads, then
/// [`release`](Code::release) it (or drop it). Evaluating released code
/// panics.
#[derive(Debug)]
pub struct Code {
    block: Option<ExecutableBlock>,
    stats: CompileStats,
}

/// Sample coordinate at the center of cell `index` of `count` cells over `[min, max]`.
pub fn cell_center(min: f64, max: f64, index: usize, count: usize) -> f64 {
    min + ((max - min) * (index as f64 + 0.5)) / count as f64
}

impl Code {
    /// Wrap a block produced by the code generator.
    pub(crate) fn new(block: ExecutableBlock, stats: CompileStats) -> Self {
        Self {
            block: Some(block),
            stats,
        }
    }

    fn block(&self) -> &ExecutableBlock {
        match &self.block {
            Some(block) => block,
            None => panic!("eval called on released code"),
        }
    }

    /// Evaluate the expression at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let block = self.block();
        // SAFETY: Code is only constructed from blocks holding a generated
        // fn(f64, f64) -> f64.
        unsafe { block.invoke(x, y) }
    }

    /// Evaluate over an `nx` by `ny` grid of cell centers, row-major into `dst`.
    ///
    /// Cell `(ix, iy)` is written to `dst[iy * nx + ix]`.
    #[allow(clippy::too_many_arguments)]
    pub fn eval_grid(
        &self,
        dst: &mut [f64],
        xmin: f64,
        xmax: f64,
        nx: usize,
        ymin: f64,
        ymax: f64,
        ny: usize,
    ) -> JitResult<()> {
        if nx.checked_mul(ny) != Some(dst.len()) {
            return Err(JitError::GridSize {
                nx,
                ny,
                len: dst.len(),
            });
        }
        let block = self.block();

        for (iy, row) in dst.chunks_exact_mut(nx.max(1)).enumerate().take(ny) {
            let y = cell_center(ymin, ymax, iy, ny);
            for (ix, cell) in row.iter_mut().enumerate() {
                let x = cell_center(xmin, xmax, ix, nx);
                // SAFETY: see `eval`.
                *cell = unsafe { block.invoke(x, y) };
            }
        }
        Ok(())
    }

    /// Unmap the code. Further evaluation panics.
    ///
    /// Panics if the code was already released.
    pub fn release(&mut self) {
        match self.block.take() {
            Some(block) => drop(block),
            None => panic!("code released twice"),
        }
    }

    pub fn is_released(&self) -> bool {
        self.block.is_none()
    }

    /// Size and register allocation statistics of the compiled code.
    pub fn stats(&self) -> CompileStats {
        self.stats
    }
}
