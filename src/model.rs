use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::encoding::{FourierFeatures, FourierFeaturesConfig};
use crate::error::{PinnError, Result as PinnResult};
use crate::jet::Jet;

/// 近似ネットワークの設定。
#[derive(Config, Debug)]
pub struct ApproximatorConfig {
    /// 隠れ層の幅。
    #[config(default = 20)]
    pub width: usize,
    /// 入力層と出力層を含む層の数（3 以上）。
    #[config(default = 4)]
    pub depth: usize,
    /// 指定するとネットワークの前段にフーリエ特徴量を挟みます。
    pub features: Option<FourierFeaturesConfig>,
}

impl ApproximatorConfig {
    /// 新しいモデルを初期化します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> PinnResult<Approximator<B>> {
        if self.depth < 3 {
            return Err(PinnError::configuration(format!(
                "層の数は 3 以上が必要です (depth = {})",
                self.depth
            )));
        }
        if self.width == 0 {
            return Err(PinnError::configuration("隠れ層の幅は 1 以上が必要です"));
        }
        let encoder = self
            .features
            .as_ref()
            .map(|features| features.init(device))
            .transpose()?;
        let n_input = encoder.as_ref().map_or(1, FourierFeatures::output_size);

        let mut linears = Vec::with_capacity(self.depth - 1);
        linears.push(LinearConfig::new(n_input, self.width).init(device));
        for _ in 0..(self.depth - 3) {
            linears.push(LinearConfig::new(self.width, self.width).init(device));
        }
        linears.push(LinearConfig::new(self.width, 1).init(device));
        Ok(Approximator { encoder, linears })
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// スカラー座標 `x` を入力とし、その点における解 `y` を予測する多層パーセプトロン（MLP）です。
/// 最後の層を除く各アフィン層の後に `tanh` を挟みます。
#[derive(Module, Debug)]
pub struct Approximator<B: Backend> {
    encoder: Option<FourierFeatures<B>>,
    linears: Vec<Linear<B>>,
}

impl<B: Backend> Approximator<B> {
    /// 既に初期化済みの層からモデルを組み立てます。
    pub fn from_layers(encoder: Option<FourierFeatures<B>>, linears: Vec<Linear<B>>) -> PinnResult<Self> {
        if linears.len() < 2 {
            return Err(PinnError::configuration(
                "入力層と出力層の少なくとも 2 つのアフィン層が必要です",
            ));
        }
        Ok(Self { encoder, linears })
    }

    pub fn linears(&self) -> &[Linear<B>] {
        &self.linears
    }

    /// モデルの順伝播を実行します。入力 `[batch, 1]` に対して `[batch, 1]` を返します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_jet(Jet::constant(input)).into_value()
    }

    /// 入力ジェットを各層に通し、出力とその `x` に関する微分を返します。
    pub fn forward_jet(&self, input: Jet<B>) -> Jet<B> {
        let mut x = match &self.encoder {
            Some(encoder) => encoder.forward(input),
            None => input,
        };
        let last = self.linears.len().saturating_sub(1);
        for (i, linear) in self.linears.iter().enumerate() {
            x = x.linear(linear);
            if i < last {
                x = x.tanh();
            }
        }
        x
    }
}
