//! # 厳密解が分かっている例題
//!
//! いずれも右辺は `f(x, y, y') = a y + b y' + c x + d` の形です。

use std::f64::consts::{E, FRAC_PI_2};

use burn::config::Config;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::ApproximatorConfig;
use crate::problem::{LinearOde, ProblemConfig};
use crate::session::TrainingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Scenario {
    /// y'' = 0, y(0) = 0, y(1) = 1  →  y = x
    Linear,
    /// y'' = 0, y(0) = 1, y'(1) = 0  →  y = 1
    Constant,
    /// y'' = 0, y(0) + y'(0) = 3, y'(1) = 1  →  y = 2 + x
    Robin,
    /// y'' = -y, y(0) = 0, y(π/2) = 1  →  y = sin x
    Harmonic,
    /// y'' = y', y(0) = 1, y(1) = e  →  y = eˣ
    Exponential,
}

impl Scenario {
    pub fn problem(&self) -> ProblemConfig {
        match self {
            Self::Linear => ProblemConfig::new(LinearOde::new(), 0.0, 1.0, 1, 0.0, 1.0),
            Self::Constant => ProblemConfig::new(LinearOde::new(), 0.0, 1.0, 2, 1.0, 0.0),
            Self::Robin => ProblemConfig::new(LinearOde::new(), 0.0, 1.0, 3, 3.0, 1.0),
            Self::Harmonic => ProblemConfig::new(LinearOde::new().with_y_coef(-1.0), 0.0, FRAC_PI_2, 1, 0.0, 1.0),
            Self::Exponential => ProblemConfig::new(LinearOde::new().with_dy_coef(1.0), 0.0, 1.0, 1, 1.0, E),
        }
    }

    pub fn exact(&self, x: f64) -> f64 {
        match self {
            Self::Linear => x,
            Self::Constant => 1.0,
            Self::Robin => 2.0 + x,
            Self::Harmonic => x.sin(),
            Self::Exponential => x.exp(),
        }
    }
}

/// 学習の実行に必要な設定一式。学習済みモデルと一緒に保存され、推論時に読み込まれます。
#[derive(Config)]
pub struct ExperimentConfig {
    pub problem: ProblemConfig,
    pub model: ApproximatorConfig,
    pub training: TrainingConfig,
    /// 例題から作った場合のみ設定され、厳密解との比較に使います。
    pub scenario: Option<Scenario>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{BoundaryCondition, Rhs};
    use approx::assert_abs_diff_eq;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    type TestBackend = NdArray<f32>;

    const ALL: [Scenario; 5] = [
        Scenario::Linear,
        Scenario::Constant,
        Scenario::Robin,
        Scenario::Harmonic,
        Scenario::Exponential,
    ];

    fn derivative(f: impl Fn(f64) -> f64, x: f64) -> f64 {
        let h = 1e-5;
        (f(x + h) - f(x - h)) / (2.0 * h)
    }

    #[test]
    fn exact_solutions_satisfy_boundary_conditions() {
        for scenario in ALL {
            let problem = scenario.problem().build().unwrap();
            let (lb, ub) = (problem.domain().lb(), problem.domain().ub());
            let y = |x| scenario.exact(x);
            let (lower, upper) = match problem.boundary() {
                BoundaryCondition::DirichletDirichlet { .. } => (y(lb), y(ub)),
                BoundaryCondition::DirichletNeumann { .. } => (y(lb), derivative(y, ub)),
                BoundaryCondition::RobinNeumann { .. } => (y(lb) + derivative(y, lb), derivative(y, ub)),
            };
            let (target_l, target_u) = problem.boundary().targets();
            assert_abs_diff_eq!(lower, target_l, epsilon = 1e-6);
            assert_abs_diff_eq!(upper, target_u, epsilon = 1e-6);
        }
    }

    #[test]
    fn exact_solutions_satisfy_the_ode() {
        let device = Default::default();
        for scenario in ALL {
            let problem = scenario.problem().build().unwrap();
            for x in [0.1, 0.4, 0.9] {
                let y = scenario.exact(x);
                let dy = derivative(|t| scenario.exact(t), x);
                let d2y = derivative(|t| derivative(|s| scenario.exact(s), t), x);
                let column = |v: f64| Tensor::<TestBackend, 2>::from_floats([[v as f32]], &device);
                let f = problem
                    .rhs()
                    .eval(column(x), column(y), column(dy))
                    .into_scalar() as f64;
                assert_abs_diff_eq!(d2y, f, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn experiment_config_survives_save_and_load() {
        let training = TrainingConfig::new(burn::optim::AdamConfig::new())
            .with_batch_size(16)
            .with_seed(Some(9));
        let experiment = ExperimentConfig::new(Scenario::Robin.problem(), ApproximatorConfig::new().with_depth(5), training)
            .with_scenario(Some(Scenario::Robin));

        let path = std::env::temp_dir().join(format!("ode-pinn-experiment-{}.json", std::process::id()));
        experiment.save(&path).unwrap();
        let loaded = ExperimentConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.scenario, Some(Scenario::Robin));
        assert_eq!(loaded.model.depth, 5);
        assert_eq!(loaded.training.batch_size, 16);
        assert_eq!(loaded.training.seed, Some(9));
        assert_eq!(loaded.problem.rhs, Scenario::Robin.problem().rhs);
        assert_eq!(
            loaded.problem.build().unwrap().boundary(),
            Scenario::Robin.problem().build().unwrap().boundary()
        );
    }
}
