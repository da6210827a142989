pub mod loader;
pub mod types;

pub use loader::{load_series_file, LoaderError, SeriesLoader, SUPPORTED_EXTENSIONS};
pub use types::{InputKey, InputSet, Series, SeriesError, TimePoint};
