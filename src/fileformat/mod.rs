pub mod gtf;
pub mod mtx;
pub mod peak_id;

pub use peak_id::bed_to_peak_id;
pub use peak_id::convert_peak_file;
pub use peak_id::peak_id_to_bed;
pub use peak_id::split_peak_id;
pub use peak_id::PeakFormat;
