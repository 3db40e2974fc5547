//! # 境界値問題の定義
//!
//! `y'' = f(x, y, y')` を区間 `[lb, ub]` 上で解くための問題設定（定義域・境界条件・
//! 損失の重み・右辺関数）をまとめます。

use burn::config::Config;
use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::error::{PinnError, Result as PinnResult};

/// 閉区間 `[lb, ub]`（`lb < ub`）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    lb: f64,
    ub: f64,
}

impl Domain {
    pub fn new(lb: f64, ub: f64) -> PinnResult<Self> {
        if !(lb.is_finite() && ub.is_finite()) || lb >= ub {
            return Err(PinnError::configuration(format!(
                "定義域は有限かつ lb < ub である必要があります (lb = {lb}, ub = {ub})"
            )));
        }
        Ok(Self { lb, ub })
    }

    pub fn lb(&self) -> f64 {
        self.lb
    }

    pub fn ub(&self) -> f64 {
        self.ub
    }

    pub fn width(&self) -> f64 {
        self.ub - self.lb
    }

    /// 両端を含む等間隔の `n` 点。
    pub fn linspace(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![self.lb],
            _ => {
                let step = self.width() / (n - 1) as f64;
                (0..n)
                    .map(|i| if i == n - 1 { self.ub } else { self.lb + i as f64 * step })
                    .collect()
            }
        }
    }
}

/// 境界条件。2 つの目標値は構築後に変更できません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// `y(lb) = lower`, `y(ub) = upper`
    DirichletDirichlet { lower: f64, upper: f64 },
    /// `y(lb) = lower`, `y'(ub) = upper`
    DirichletNeumann { lower: f64, upper: f64 },
    /// `y(lb) + y'(lb) = lower`, `y'(ub) = upper`
    RobinNeumann { lower: f64, upper: f64 },
}

impl BoundaryCondition {
    /// 数値の種類 (1, 2, 3) から境界条件を作ります。それ以外の値は設定エラーです。
    pub fn from_kind(kind: u8, lower: f64, upper: f64) -> PinnResult<Self> {
        match kind {
            1 => Ok(Self::DirichletDirichlet { lower, upper }),
            2 => Ok(Self::DirichletNeumann { lower, upper }),
            3 => Ok(Self::RobinNeumann { lower, upper }),
            other => Err(PinnError::configuration(format!(
                "未知の境界条件の種類です: {other} (1, 2, 3 のいずれか)"
            ))),
        }
    }

    pub fn kind(&self) -> u8 {
        match self {
            Self::DirichletDirichlet { .. } => 1,
            Self::DirichletNeumann { .. } => 2,
            Self::RobinNeumann { .. } => 3,
        }
    }

    pub fn targets(&self) -> (f64, f64) {
        match *self {
            Self::DirichletDirichlet { lower, upper }
            | Self::DirichletNeumann { lower, upper }
            | Self::RobinNeumann { lower, upper } => (lower, upper),
        }
    }
}

/// 損失の重み (内部残差, 下端境界, 上端境界)。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossWeights {
    interior: f64,
    lower: f64,
    upper: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            interior: 1.0,
            lower: 1.0,
            upper: 1.0,
        }
    }
}

impl LossWeights {
    pub fn new(interior: f64, lower: f64, upper: f64) -> PinnResult<Self> {
        if !(interior > 0.0) {
            return Err(PinnError::configuration(format!(
                "内部残差の重みは正である必要があります ({interior})"
            )));
        }
        if !(lower >= 0.0 && upper >= 0.0) {
            return Err(PinnError::configuration(format!(
                "境界の重みは非負である必要があります ({lower}, {upper})"
            )));
        }
        Ok(Self {
            interior,
            lower,
            upper,
        })
    }

    pub fn interior(&self) -> f64 {
        self.interior
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }
}

/// 常微分方程式の右辺 `f(x, y, y')`。
///
/// 学習（自動微分バックエンド）と検証（内側バックエンド）の両方で評価するため、
/// バックエンドについてジェネリックなメソッドとして定義します。
pub trait Rhs {
    fn eval<B: Backend>(&self, x: Tensor<B, 2>, y: Tensor<B, 2>, dy: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// `f(x, y, y') = y_coef * y + dy_coef * y' + x_coef * x + constant`
#[derive(Config, Debug, PartialEq)]
pub struct LinearOde {
    #[config(default = 0.0)]
    pub y_coef: f64,
    #[config(default = 0.0)]
    pub dy_coef: f64,
    #[config(default = 0.0)]
    pub x_coef: f64,
    #[config(default = 0.0)]
    pub constant: f64,
}

impl Rhs for LinearOde {
    fn eval<B: Backend>(&self, x: Tensor<B, 2>, y: Tensor<B, 2>, dy: Tensor<B, 2>) -> Tensor<B, 2> {
        y.mul_scalar(self.y_coef) + dy.mul_scalar(self.dy_coef) + x.mul_scalar(self.x_coef).add_scalar(self.constant)
    }
}

/// 問題の保存可能な設定。`build` で検証済みの [`OdeProblem`] に変換します。
#[derive(Config, Debug)]
pub struct ProblemConfig {
    pub rhs: LinearOde,
    pub lb: f64,
    pub ub: f64,
    /// 境界条件の種類 (1, 2, 3)。
    pub bc_kind: u8,
    pub bc_lower: f64,
    pub bc_upper: f64,
    #[config(default = 1.0)]
    pub interior_weight: f64,
    #[config(default = 1.0)]
    pub lower_weight: f64,
    #[config(default = 1.0)]
    pub upper_weight: f64,
}

impl ProblemConfig {
    pub fn build(&self) -> PinnResult<OdeProblem<LinearOde>> {
        Ok(OdeProblem::new(
            self.rhs.clone(),
            Domain::new(self.lb, self.ub)?,
            BoundaryCondition::from_kind(self.bc_kind, self.bc_lower, self.bc_upper)?,
            LossWeights::new(self.interior_weight, self.lower_weight, self.upper_weight)?,
        ))
    }
}

/// 右辺・定義域・境界条件・重みをまとめた境界値問題。
#[derive(Debug, Clone)]
pub struct OdeProblem<R> {
    pub(crate) rhs: R,
    pub(crate) domain: Domain,
    pub(crate) boundary: BoundaryCondition,
    pub(crate) weights: LossWeights,
}

impl<R: Rhs> OdeProblem<R> {
    pub fn new(rhs: R, domain: Domain, boundary: BoundaryCondition, weights: LossWeights) -> Self {
        Self {
            rhs,
            domain,
            boundary,
            weights,
        }
    }

    pub fn rhs(&self) -> &R {
        &self.rhs
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    pub fn weights(&self) -> LossWeights {
        self.weights
    }
}
