//! Post-game analysis

pub mod calibration;

pub use calibration::{
    calibration_report, settle_pnl, settled_predictions, total_pnl, CalibrationBin,
    CalibrationReport, SettledPrediction,
};
