use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::error::Result;
use crate::jet::{DerivativeOrder, Jet};
use crate::model::Approximator;
use crate::problem::{BoundaryCondition, OdeProblem, Rhs};

/// 1 回の損失評価の内訳。境界項は重みを掛けた後の値です。
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    pub residual: Tensor<B, 1>,
    pub lower: Tensor<B, 1>,
    pub upper: Tensor<B, 1>,
}

fn square<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    tensor.clone() * tensor
}

impl<R: Rhs> OdeProblem<R> {
    /// 内部残差の損失を計算します。
    ///
    /// `y_hat` は `x` を入力としたモデルの出力ジェットです。
    /// 残差 `y'' - f(x, y, y')` の二乗平均を返します。
    /// `x` が 2 階微分を追跡していなければ `Differentiation` エラーになります。
    pub fn residual_loss<B: Backend>(&self, x: &Jet<B>, y_hat: &Jet<B>) -> Result<Tensor<B, 1>> {
        let d1 = y_hat.first()?;
        let d2 = y_hat.second()?;
        let f_hat = self.rhs.eval(x.value(), y_hat.value(), d1);
        Ok(square(d2 - f_hat).mean())
    }

    /// 両端での境界項 (下端, 上端) を計算します。
    ///
    /// 端点の入力はエポックごとに作り直します（計算グラフは毎回消費されるため）。
    pub fn boundary_terms<B: Backend>(
        &self,
        model: &Approximator<B>,
        device: &B::Device,
    ) -> Result<(Tensor<B, 1>, Tensor<B, 1>)> {
        let endpoint = |x: f64, order: DerivativeOrder| {
            let input = Tensor::<B, 2>::full([1, 1], x, device);
            model.forward_jet(Jet::seed(input, order))
        };
        let (lb, ub) = (self.domain.lb(), self.domain.ub());

        let (lower_residual, upper_residual) = match self.boundary {
            BoundaryCondition::DirichletDirichlet { lower, upper } => {
                let y_l = endpoint(lb, DerivativeOrder::Value);
                let y_u = endpoint(ub, DerivativeOrder::Value);
                (y_l.value().sub_scalar(lower), y_u.value().sub_scalar(upper))
            }
            BoundaryCondition::DirichletNeumann { lower, upper } => {
                let y_l = endpoint(lb, DerivativeOrder::Value);
                let y_u = endpoint(ub, DerivativeOrder::First);
                (y_l.value().sub_scalar(lower), y_u.first()?.sub_scalar(upper))
            }
            BoundaryCondition::RobinNeumann { lower, upper } => {
                let y_l = endpoint(lb, DerivativeOrder::First);
                let y_u = endpoint(ub, DerivativeOrder::First);
                let robin = y_l.value() + y_l.first()?;
                (robin.sub_scalar(lower), y_u.first()?.sub_scalar(upper))
            }
        };

        let lower = square(lower_residual).mul_scalar(self.weights.lower()).reshape([1]);
        let upper = square(upper_residual).mul_scalar(self.weights.upper()).reshape([1]);
        Ok((lower, upper))
    }

    /// 内部点 `x` (`[batch, 1]`) に対する損失の内訳を計算します。
    pub fn loss_terms<B: Backend>(&self, model: &Approximator<B>, x: Tensor<B, 2>) -> Result<LossTerms<B>> {
        let device = x.device();
        let x = Jet::seed(x, DerivativeOrder::Second);
        let y_hat = model.forward_jet(x.clone());
        let residual = self.residual_loss(&x, &y_hat)?;
        let (lower, upper) = self.boundary_terms(model, &device)?;
        Ok(LossTerms {
            residual,
            lower,
            upper,
        })
    }

    /// 内部残差と 2 つの境界項を 1 つのスカラー損失にまとめます。
    pub fn aggregate<B: Backend>(&self, terms: LossTerms<B>) -> Tensor<B, 1> {
        terms.residual.mul_scalar(self.weights.interior()) + terms.lower + terms.upper
    }

    /// `loss_terms` と `aggregate` をまとめて実行します。
    pub fn loss<B: Backend>(&self, model: &Approximator<B>, x: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        let terms = self.loss_terms(model, x)?;
        Ok(self.aggregate(terms))
    }
}
