mod args;
mod driver;
mod io;
mod time_range;

pub use args::*;
pub use driver::{MZEmpCpder, MZEmpCpderError};
pub use io::{read_peaks, write_output, PeakRecord, RecordId};
pub use time_range::{TimeRange, TimeRangeParseError};
