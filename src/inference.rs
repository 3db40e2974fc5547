use crate::cli::InferArgs;
use crate::data::to_column;
use crate::error::{PinnError, Result};
use crate::evaluation::l2_error;
use crate::scenario::ExperimentConfig;
use crate::{CONFIG_FILENAME, MODEL_FILENAME};
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use log::info;
use std::io;
use std::time::Instant;

type MyBackend = NdArray<f32>;

/// `infer`サブコマンドを実行します。
pub fn run(args: &InferArgs) -> Result<()> {
    let device = Default::default();

    let model_path = args.artifact_dir.join(MODEL_FILENAME);
    let config_path = args.artifact_dir.join(CONFIG_FILENAME);
    if !model_path.exists() || !config_path.exists() {
        return Err(PinnError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "モデルファイル '{}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。",
                model_path.display()
            ),
        )));
    }
    if args.points == 0 {
        return Err(PinnError::configuration("推論の格子点数は 1 以上が必要です"));
    }

    info!("推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    info!("保存済みモデルを '{}' からロード中...", model_path.display());
    let experiment = ExperimentConfig::load(&config_path)?;
    let problem = experiment.problem.build()?;
    let model = experiment.model.init::<MyBackend>(&device)?.load_file(
        model_path,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        &device,
    )?;

    let grid = problem.domain().linspace(args.points);
    let inputs = grid.iter().map(|&x| x as f32).collect::<Vec<f32>>();
    let predictions = model
        .forward(to_column::<MyBackend>(&inputs, &device))
        .into_data()
        .to_vec::<f32>()?;
    let inference_duration = inference_start.elapsed();

    match experiment.scenario {
        Some(scenario) => {
            info!("{:>10} {:>12} {:>12} {:>10}", "x", "y_hat", "y_exact", "|error|");
            for (&x, &y_hat) in grid.iter().zip(&predictions) {
                let y = scenario.exact(x);
                info!("{:>10.4} {:>12.6} {:>12.6} {:>10.2e}", x, y_hat, y, (y - y_hat as f64).abs());
            }
            let exact: &dyn Fn(f64) -> f64 = &move |x| scenario.exact(x);
            let error = l2_error(&problem, &model, Some(exact), &device)?;
            info!("=> 厳密解との L2 誤差: {:.4e}", error);
        }
        None => {
            info!("{:>10} {:>12}", "x", "y_hat");
            for (&x, &y_hat) in grid.iter().zip(&predictions) {
                info!("{:>10.4} {:>12.6}", x, y_hat);
            }
        }
    }
    info!(
        "推論が完了しました。格子点数: {}, 出力テンソルの要素数: {}",
        args.points,
        predictions.len()
    );
    info!("=> 推論時間: {:.2?}", inference_duration);

    Ok(())
}
