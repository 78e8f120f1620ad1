use std::path::Path;

use doa::sim::{Detection, RmseSweep, VirtualArrayRun};
use plotters::prelude::*;

const SIZE: (u32, u32) = (800, 500);

fn snr_axis(snr: &[i32]) -> std::ops::Range<f64> {
    let lo = snr.first().copied().unwrap_or_default() as f64;
    let hi = snr.last().copied().unwrap_or_default() as f64;
    // a single SNR value still needs a non-empty axis
    (lo - 0.5)..(hi + 0.5)
}

pub fn detection(path: &Path, detection: &Detection, trials: usize) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Detection probability vs SNR ({trials} trials per SNR)"),
            ("sans-serif", 20),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(snr_axis(&detection.snr), 0f64..1.05)?;

    chart
        .configure_mesh()
        .x_desc("SNR (dB)")
        .y_desc("Detection probability (all sources detected)")
        .draw()?;

    let points: Vec<(f64, f64)> = detection
        .snr
        .iter()
        .zip(&detection.ratio)
        .map(|(&snr, &ratio)| (snr as f64, ratio))
        .collect();

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &BLUE))?
        .label("MUSIC")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart.draw_series(
        points
            .iter()
            .map(|&p| TriangleMarker::new(p, 5, BLUE.filled())),
    )?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

pub fn rmse(path: &Path, sweep: &RmseSweep) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let top = sweep
        .rmse
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0f64, f64::max)
        .max(0.1)
        * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("MUSIC RMSE vs SNR", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(snr_axis(&sweep.snr), 0f64..top)?;

    chart
        .configure_mesh()
        .x_desc("SNR (dB)")
        .y_desc("RMSE (deg)")
        .draw()?;

    // undefined RMSE values leave gaps
    let points = sweep
        .snr
        .iter()
        .zip(&sweep.rmse)
        .filter(|(_, v)| v.is_finite())
        .map(|(&snr, &v)| (snr as f64, v));
    chart.draw_series(LineSeries::new(points, &BLUE))?;

    root.present()?;
    Ok(())
}

pub fn spectrum(
    path: &Path,
    run: &VirtualArrayRun,
    true_angles: &[f64],
    snr: f64,
) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let floor = run
        .spectrum
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0f64, f64::min)
        - 5.;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("MUSIC spectrum @ {snr} dB (last run)"),
            ("sans-serif", 20),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-90f64..90f64, floor..5f64)?;

    chart
        .configure_mesh()
        .x_desc("Angle (deg)")
        .y_desc("Power (dB)")
        .draw()?;

    for &angle in true_angles {
        chart.draw_series(LineSeries::new(
            [(angle, floor), (angle, 5.)],
            &RED.mix(0.5),
        ))?;
    }

    let curve = run
        .angles
        .iter()
        .zip(&run.spectrum)
        .map(|(&a, &p)| (a, p.max(floor)));
    chart
        .draw_series(LineSeries::new(curve, &BLUE))?
        .label("Normalized MUSIC spectrum")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
