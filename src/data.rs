//! # コロケーション点のサンプリング
//!
//! 定義域 `[lb, ub]` から一様にスカラー点を引き、`[batch, 1]` のテンソルとして渡します。

use burn::prelude::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{PinnError, Result};
use crate::problem::Domain;

/// シードがあれば再現可能な、なければ OS の乱数で初期化した乱数生成器。
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// `domain` 上の一様乱数を `n` 個生成します。
pub fn sample_points(domain: Domain, n: usize, rng: &mut impl Rng) -> Vec<f32> {
    (0..n)
        .map(|_| rng.random_range(domain.lb()..=domain.ub()) as f32)
        .collect()
}

/// 点列を `[len, 1]` のテンソルに変換します。
pub fn to_column<B: Backend>(points: &[f32], device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(points, device).reshape([points.len(), 1])
}

/// 一様に引いた新しいバッチを 1 つ作ります（検証・テスト用）。
pub fn sample_one_batch<B: Backend>(
    domain: Domain,
    batch_size: usize,
    rng: &mut impl Rng,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    if batch_size == 0 {
        return Err(PinnError::configuration("バッチサイズは 1 以上が必要です"));
    }
    Ok(to_column(&sample_points(domain, batch_size, rng), device))
}

/// 学習用のコロケーション点。学習開始時に一度だけ引き、エポックごとに並べ替えてミニバッチに分割します。
#[derive(Debug, Clone)]
pub struct CollocationLoader {
    points: Vec<f32>,
    batch_size: usize,
}

impl CollocationLoader {
    pub fn new(domain: Domain, num_samples: usize, batch_size: usize, rng: &mut impl Rng) -> Result<Self> {
        if num_samples == 0 {
            return Err(PinnError::configuration("学習サンプル数は 1 以上が必要です"));
        }
        if batch_size == 0 {
            return Err(PinnError::configuration("バッチサイズは 1 以上が必要です"));
        }
        Ok(Self {
            points: sample_points(domain, num_samples, rng),
            batch_size,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.points.len()
    }

    /// 1 エポックあたりのバッチ数。バッチサイズがサンプル数を超える場合は 1 です。
    pub fn num_batches(&self) -> usize {
        self.points.len().div_ceil(self.batch_size)
    }

    /// 点を並べ替え、1 エポック分のミニバッチを返します。最後のバッチは短くなることがあります。
    pub fn shuffled_batches<B: Backend>(&mut self, rng: &mut impl Rng, device: &B::Device) -> Vec<Tensor<B, 2>> {
        self.points.shuffle(rng);
        self.points
            .chunks(self.batch_size)
            .map(|chunk| to_column(chunk, device))
            .collect()
    }
}
