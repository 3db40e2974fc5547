use burn::prelude::Backend;
use burn::tensor::ElementConversion;
use rand::Rng;

use crate::data::{sample_one_batch, to_column};
use crate::error::{PinnError, Result};
use crate::model::Approximator;
use crate::problem::{OdeProblem, Rhs};

/// L2 誤差の数値積分に使う格子点の数。
pub const L2_GRID_POINTS: usize = 2000;

/// 新しく引いたバッチに対する損失を計算します。パラメータは更新しません。
pub fn sample_loss<B: Backend, R: Rhs>(
    problem: &OdeProblem<R>,
    model: &Approximator<B>,
    sample_num: usize,
    rng: &mut impl Rng,
    device: &B::Device,
) -> Result<f64> {
    let x = sample_one_batch::<B>(problem.domain(), sample_num, rng, device)?;
    let loss = problem.loss(model, x)?;
    Ok(loss.into_scalar().elem::<f64>())
}

/// 台形公式による `∫ y dx`。
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}

/// 厳密解に対する L2 誤差 `sqrt(∫ (y - y_hat)² dx)` を、定義域上の等間隔格子で計算します。
pub fn l2_error<B: Backend, R: Rhs>(
    problem: &OdeProblem<R>,
    model: &Approximator<B>,
    exact: Option<&dyn Fn(f64) -> f64>,
    device: &B::Device,
) -> Result<f64> {
    let exact = exact.ok_or_else(|| {
        PinnError::caller_contract("L2 誤差の計算には厳密解が必要です")
    })?;
    let grid = problem.domain().linspace(L2_GRID_POINTS);
    let inputs = grid.iter().map(|&x| x as f32).collect::<Vec<f32>>();
    let predictions = model
        .forward(to_column::<B>(&inputs, device))
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()?;

    let squared_error = grid
        .iter()
        .zip(&predictions)
        .map(|(&x, &y_hat)| (exact(x) - y_hat).powi(2))
        .collect::<Vec<f64>>();
    Ok(trapezoid(&grid, &squared_error).sqrt())
}
