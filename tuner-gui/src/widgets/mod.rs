//! Canvas widgets drawn from analysis data.

pub mod spectrum_plot;
