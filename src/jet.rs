//! # 2階ジェット（前進モード微分）
//!
//! `burn` の `grad` は内側バックエンドのテンソルを返すため、入力に関する微分を
//! そのまま損失に組み込むとパラメータへの勾配が途切れてしまいます。
//! ここではスカラー入力 `x` に関する値・1階微分・2階微分の組 (ジェット) を
//! 各層に通して前進モードで伝播します。すべて通常のテンソル演算で組み立てるため、
//! 最終的な損失から `backward()` すればパラメータ勾配が D1, D2 を通って流れます。

use burn::nn::Linear;
use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::error::{PinnError, Result};

/// ジェットが追跡している微分の最大階数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivativeOrder {
    /// 値のみ（微分の追跡なし）。
    Value,
    /// 1階微分まで。
    First,
    /// 2階微分まで。
    Second,
}

/// 形状 `[batch, features]` のテンソルと、その入力 `x` に関する微分。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend> {
    value: Tensor<B, 2>,
    first: Option<Tensor<B, 2>>,
    second: Option<Tensor<B, 2>>,
}

impl<B: Backend> Jet<B> {
    /// 独立変数 `x` (形状 `[batch, 1]`) から、指定した階数までを追跡するジェットを作ります。
    pub fn seed(x: Tensor<B, 2>, order: DerivativeOrder) -> Self {
        let first = (order >= DerivativeOrder::First).then(|| x.ones_like());
        let second = (order >= DerivativeOrder::Second).then(|| x.zeros_like());
        Self {
            value: x,
            first,
            second,
        }
    }

    /// 微分を追跡しないジェット。推論用の順伝播で使います。
    pub fn constant(x: Tensor<B, 2>) -> Self {
        Self::seed(x, DerivativeOrder::Value)
    }

    pub fn order(&self) -> DerivativeOrder {
        match (&self.first, &self.second) {
            (Some(_), Some(_)) => DerivativeOrder::Second,
            (Some(_), None) => DerivativeOrder::First,
            _ => DerivativeOrder::Value,
        }
    }

    pub fn value(&self) -> Tensor<B, 2> {
        self.value.clone()
    }

    pub fn into_value(self) -> Tensor<B, 2> {
        self.value
    }

    /// d(value)/dx。
    pub fn first(&self) -> Result<Tensor<B, 2>> {
        self.first.clone().ok_or(PinnError::Differentiation {
            requested: DerivativeOrder::First,
            available: self.order(),
        })
    }

    /// d²(value)/dx²。
    pub fn second(&self) -> Result<Tensor<B, 2>> {
        self.second.clone().ok_or(PinnError::Differentiation {
            requested: DerivativeOrder::Second,
            available: self.order(),
        })
    }

    /// アフィン変換 `z = h W + b`。微分にはバイアスが乗らないので `W` だけを掛けます。
    pub fn linear(self, layer: &Linear<B>) -> Self {
        let weight = layer.weight.val();
        Self {
            value: layer.forward(self.value),
            first: self.first.map(|d| d.matmul(weight.clone())),
            second: self.second.map(|d| d.matmul(weight)),
        }
    }

    /// バイアスなしの線形射影 `z = h P`。
    pub fn project(self, projection: Tensor<B, 2>) -> Self {
        Self {
            value: self.value.matmul(projection.clone()),
            first: self.first.map(|d| d.matmul(projection.clone())),
            second: self.second.map(|d| d.matmul(projection)),
        }
    }

    pub fn mul_scalar(self, factor: f64) -> Self {
        Self {
            value: self.value.mul_scalar(factor),
            first: self.first.map(|d| d.mul_scalar(factor)),
            second: self.second.map(|d| d.mul_scalar(factor)),
        }
    }

    /// `a = tanh(z)`, `a' = (1 - a²) z'`, `a'' = (1 - a²)(z'' - 2 a z'²)`
    pub fn tanh(self) -> Self {
        let a = self.value.tanh();
        let slope = a.ones_like() - a.clone() * a.clone();
        let second = match (&self.first, self.second) {
            (Some(z1), Some(z2)) => {
                let curvature = a.clone().mul_scalar(2.0) * z1.clone() * z1.clone();
                Some(slope.clone() * (z2 - curvature))
            }
            _ => None,
        };
        let first = self.first.map(|z1| slope * z1);
        Self {
            value: a,
            first,
            second,
        }
    }

    /// `(cos z, sin z)` を特徴次元で連結したジェット。
    pub fn cos_sin(self) -> Self {
        let cos = self.value.clone().cos();
        let sin = self.value.sin();
        let second = match (&self.first, self.second) {
            (Some(z1), Some(z2)) => {
                let z1_sq = z1.clone() * z1.clone();
                let d2_cos = (cos.clone() * z1_sq.clone()).neg() - sin.clone() * z2.clone();
                let d2_sin = (sin.clone() * z1_sq).neg() + cos.clone() * z2;
                Some(Tensor::cat(vec![d2_cos, d2_sin], 1))
            }
            _ => None,
        };
        let first = self.first.map(|z1| {
            let d1_cos = (sin.clone() * z1.clone()).neg();
            let d1_sin = cos.clone() * z1;
            Tensor::cat(vec![d1_cos, d1_sin], 1)
        });
        Self {
            value: Tensor::cat(vec![cos, sin], 1),
            first,
            second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::backend::NdArray;
    use burn::module::Param;

    type TestBackend = NdArray<f32>;

    fn column(values: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::<TestBackend, 1>::from_floats(values, &Default::default()).reshape([values.len(), 1])
    }

    fn to_vec(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    fn scalar_layer(weight: f32, bias: f32) -> Linear<TestBackend> {
        let device = Default::default();
        Linear {
            weight: Param::from_tensor(Tensor::from_floats([[weight]], &device)),
            bias: Some(Param::from_tensor(Tensor::from_floats([bias], &device))),
        }
    }

    #[test]
    fn seed_tracks_requested_order() {
        let x = column(&[0.1, 0.2]);
        assert_eq!(Jet::seed(x.clone(), DerivativeOrder::Second).order(), DerivativeOrder::Second);
        assert_eq!(Jet::seed(x.clone(), DerivativeOrder::First).order(), DerivativeOrder::First);
        assert_eq!(Jet::constant(x).order(), DerivativeOrder::Value);
    }

    #[test]
    fn missing_derivatives_are_differentiation_errors() {
        let jet = Jet::seed(column(&[0.5]), DerivativeOrder::First);
        assert!(jet.first().is_ok());
        match jet.second() {
            Err(PinnError::Differentiation {
                requested,
                available,
            }) => {
                assert_eq!(requested, DerivativeOrder::Second);
                assert_eq!(available, DerivativeOrder::First);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(Jet::constant(column(&[0.5])).first().is_err());
    }

    #[test]
    fn tanh_of_affine_matches_closed_form() {
        let (w, b) = (1.7_f32, -0.3_f32);
        let xs = [-1.0_f32, -0.25, 0.0, 0.6, 1.4];
        let jet = Jet::seed(column(&xs), DerivativeOrder::Second)
            .linear(&scalar_layer(w, b))
            .tanh();

        let values = to_vec(jet.value());
        let firsts = to_vec(jet.first().unwrap());
        let seconds = to_vec(jet.second().unwrap());
        for (i, &x) in xs.iter().enumerate() {
            let t = (w * x + b).tanh();
            let s = 1.0 - t * t;
            assert_abs_diff_eq!(values[i], t, epsilon = 1e-5);
            assert_abs_diff_eq!(firsts[i], w * s, epsilon = 1e-5);
            assert_abs_diff_eq!(seconds[i], -2.0 * w * w * t * s, epsilon = 1e-5);
        }
    }

    #[test]
    fn cos_sin_doubles_feature_width_and_differentiates() {
        let xs = [0.0_f32, 0.3, 1.1];
        let jet = Jet::seed(column(&xs), DerivativeOrder::Second)
            .mul_scalar(2.0)
            .cos_sin();

        assert_eq!(jet.value().dims(), [3, 2]);
        let firsts = to_vec(jet.first().unwrap());
        let seconds = to_vec(jet.second().unwrap());
        for (i, &x) in xs.iter().enumerate() {
            let z = 2.0 * x;
            assert_abs_diff_eq!(firsts[2 * i], -2.0 * z.sin(), epsilon = 1e-5);
            assert_abs_diff_eq!(firsts[2 * i + 1], 2.0 * z.cos(), epsilon = 1e-5);
            assert_abs_diff_eq!(seconds[2 * i], -4.0 * z.cos(), epsilon = 1e-5);
            assert_abs_diff_eq!(seconds[2 * i + 1], -4.0 * z.sin(), epsilon = 1e-5);
        }
    }
}
