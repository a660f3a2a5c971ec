mod reader;

pub use reader::MobilityReportSource;
