//! CSV output.

use std::path::Path;

use doa::sim::{Detection, RmseSweep, VirtualArrayRun};

pub fn detection(path: &Path, detection: &Detection) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(["snr_db", "detection_ratio"])?;
    for (snr, ratio) in detection.snr.iter().zip(&detection.ratio) {
        w.write_record([snr.to_string(), ratio.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

pub fn rmse(path: &Path, sweep: &RmseSweep) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(["snr_db", "rmse_deg"])?;
    for (snr, rmse) in sweep.snr.iter().zip(&sweep.rmse) {
        w.write_record([snr.to_string(), rmse.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

pub fn spectrum(path: &Path, run: &VirtualArrayRun) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(["angle_deg", "power_db"])?;
    for (angle, power) in run.angles.iter().zip(&run.spectrum) {
        w.write_record([angle.to_string(), power.to_string()])?;
    }
    w.flush()?;
    Ok(())
}
