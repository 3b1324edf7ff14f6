use std::error::Error;
use std::path::Path;

use eigenfaces::{
    load_directory, run_sweep, stratified_split, DatasetConfig, Metric, SplitConfig, SweepGrid,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <gallery_dir>", args[0]);
        std::process::exit(2);
    }

    let dataset = load_directory(Path::new(&args[1]), &DatasetConfig::default())?;
    let split = stratified_split(&dataset, &SplitConfig::default())?;

    let grid = SweepGrid {
        energies: vec![0.8, 0.9, 0.95],
        metrics: vec![Metric::L2, Metric::Cosine],
        reconstruction_thresholds: vec![None],
        confidence_thresholds: vec![None, Some(0.5), Some(0.8)],
    };
    let report = run_sweep(&dataset, &split, &grid)?;

    for record in &report.records {
        println!(
            "energy {:.2} metric {:6} eps_i {:>6} -> rank {:3} accuracy {:.3} macro-F1 {:.3}",
            record.energy,
            record.metric.name(),
            record
                .confidence_threshold
                .map_or("off".to_owned(), |t| format!("{:.2}", t)),
            record.rank,
            record.accuracy,
            record.macro_f1
        );
    }
    if let Some(best) = report.best() {
        println!(
            "best: energy {:.2}, metric {}, macro-F1 {:.3}",
            best.energy, best.metric, best.macro_f1
        );
    }
    Ok(())
}
