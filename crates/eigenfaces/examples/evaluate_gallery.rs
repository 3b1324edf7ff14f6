use std::error::Error;
use std::path::Path;

use eigenfaces::{
    load_directory, run_evaluation, stratified_split, DatasetConfig, Metric, RunParams,
    SplitConfig,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <gallery_dir> [energy] [metric]", args[0]);
        std::process::exit(2);
    }

    let energy: f64 = if args.len() > 2 { args[2].parse()? } else { 0.9 };
    let metric: Metric = if args.len() > 3 {
        args[3].parse()?
    } else {
        Metric::L2
    };

    let dataset = load_directory(Path::new(&args[1]), &DatasetConfig::default())?;
    let split = stratified_split(&dataset, &SplitConfig::default())?;

    let params = RunParams {
        energy,
        metric,
        ..RunParams::default()
    };
    let report = run_evaluation(&dataset, &split, &params)?;

    println!(
        "{} classes, {} train / {} test, rank {} ({:.1}% energy)",
        dataset.classes.len(),
        report.n_train,
        report.n_test,
        report.rank,
        100.0 * report.explained_energy
    );
    println!(
        "accuracy {:.3}, macro-F1 {:.3}, {} unknown",
        report.accuracy, report.macro_f1, report.n_unknown
    );
    Ok(())
}
