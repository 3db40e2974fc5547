use crate::cli::TrainArgs;
use crate::error::{PinnError, Result};
use crate::session::{TrainingHistory, TrainingSession};
use crate::{CONFIG_FILENAME, LOSS_PLOT_FILENAME, MODEL_FILENAME};
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use log::info;
use plotters::prelude::*;
use std::fs;
use std::path::Path;

type MyBackend = Autodiff<NdArray<f32>>;

/// `train`サブコマンドを実行します。
pub fn run(args: &TrainArgs) -> Result<()> {
    let device = Default::default();
    let experiment = args.experiment()?;
    if let Some(seed) = experiment.training.seed {
        MyBackend::seed(seed);
    }

    // --- 問題とモデルの初期化 ---
    let problem = experiment.problem.build()?;
    let exact = experiment
        .scenario
        .map(|scenario| move |x: f64| scenario.exact(x));
    let exact = exact.as_ref().map(|f| f as &dyn Fn(f64) -> f64);
    let mut session = TrainingSession::<MyBackend, _>::from_config(problem, &experiment.model, device)?;

    info!(
        "学習を開始します ({}) - バックエンド: NdArray (CPU)",
        experiment
            .scenario
            .map_or_else(|| "custom".to_string(), |scenario| format!("{scenario:?}"))
    );

    // --- 学習ループ ---
    session.train(&experiment.training, exact)?;
    session.test(experiment.training.validation_samples(), None)?;
    if exact.is_some() {
        info!("=> 厳密解との L2 誤差: {:.4e}", session.l2_error(exact)?);
    }

    // --- 結果の保存と描画 ---
    fs::create_dir_all(&args.artifact_dir)?;
    let plot_path = args.artifact_dir.join(LOSS_PLOT_FILENAME);
    plot_loss_history(&plot_path, session.history()).map_err(|e| PinnError::Plot(e.to_string()))?;
    info!("=> 損失グラフを '{}' に保存しました。", plot_path.display());

    let config_path = args.artifact_dir.join(CONFIG_FILENAME);
    experiment.save(&config_path)?;

    info!("学習済みモデルを保存中...");
    let model_path = args.artifact_dir.join(MODEL_FILENAME);
    session
        .into_model()
        .save_file(model_path.clone(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())?;
    info!("=> モデルを '{}' に保存しました。", model_path.display());

    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(path: &Path, history: &TrainingHistory) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let series = [
        ("Train Loss", history.train_loss(), &RED),
        ("Validate Loss", history.validate_loss(), &BLUE),
        ("L2 Error", history.l2_loss(), &GREEN),
    ];
    let log_values = series
        .iter()
        .flat_map(|(_, values, _)| values.iter())
        .filter(|&&v| v > 0.0)
        .map(|v| v.log10());
    let (min_log, max_log) = log_values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let (min_log, max_log) = if min_log.is_finite() {
        (min_log - 0.5, max_log + 0.5)
    } else {
        (-6.0, 0.0)
    };

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(1..history.len().max(1) + 1, min_log..max_log)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epochs")
        .draw()?;
    for (label, values, color) in series {
        if values.is_empty() {
            continue;
        }
        chart
            .draw_series(LineSeries::new(
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, val)| **val > 0.0)
                    .map(|(i, &val)| (i + 1, val.log10())),
                color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
