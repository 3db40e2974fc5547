use std::f64::consts::PI;

use burn::config::Config;
use burn::module::{Module, Param};
use burn::prelude::Backend;
use burn::tensor::{Distribution, Tensor};

use crate::error::{PinnError, Result as PinnResult};
use crate::jet::Jet;

/// ランダムフーリエ特徴量の設定。
///
/// 射影ベクトル `B` (`[1, num_features]`) の各成分は平均 `center`, 標準偏差 `spread` の
/// 正規分布から引かれます。`projection` を与えた場合はその値をそのまま使います。
#[derive(Config, Debug)]
pub struct FourierFeaturesConfig {
    #[config(default = 25)]
    pub num_features: usize,
    #[config(default = 0.0)]
    pub center: f64,
    #[config(default = 1.0)]
    pub spread: f64,
    /// 固定の射影ベクトル。長さは `num_features` と一致する必要があります。
    pub projection: Option<Vec<f64>>,
}

/// スカラー入力 `x` を `[cos(2π x B), sin(2π x B)]` (`2 * num_features` 次元) に持ち上げます。
///
/// 射影は学習対象ではありません。
#[derive(Module, Debug)]
pub struct FourierFeatures<B: Backend> {
    projection: Param<Tensor<B, 2>>,
}

impl FourierFeaturesConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PinnResult<FourierFeatures<B>> {
        if self.num_features == 0 {
            return Err(PinnError::configuration("フーリエ特徴量の数は 1 以上が必要です"));
        }
        if self.spread.is_sign_negative() {
            return Err(PinnError::configuration(format!(
                "フーリエ特徴量の標準偏差が負です: {}",
                self.spread
            )));
        }
        let projection = match &self.projection {
            Some(values) if values.len() != self.num_features => {
                return Err(PinnError::configuration(format!(
                    "射影ベクトルの長さ {} が特徴量の数 {} と一致しません",
                    values.len(),
                    self.num_features
                )));
            }
            Some(values) => {
                let values = values.iter().map(|&v| v as f32).collect::<Vec<f32>>();
                Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([1, self.num_features])
            }
            None => Tensor::random(
                [1, self.num_features],
                Distribution::Normal(self.center, self.spread),
                device,
            ),
        };
        let features = FourierFeatures {
            projection: Param::from_tensor(projection),
        };
        Ok(features.no_grad())
    }
}

impl<B: Backend> FourierFeatures<B> {
    pub fn output_size(&self) -> usize {
        2 * self.projection.val().dims()[1]
    }

    pub fn forward(&self, x: Jet<B>) -> Jet<B> {
        x.project(self.projection.val()).mul_scalar(2.0 * PI).cos_sin()
    }
}
