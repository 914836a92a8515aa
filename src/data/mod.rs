pub mod bar;
pub mod dbn;
pub mod fetch;
pub mod loader;
pub mod normalize;
pub mod record;

pub use bar::{Bar, BarError};
pub use dbn::{DbnDecoder, DbnError};
pub use fetch::{describe_and_fetch, fetch_and_store, write_csv};
pub use loader::{filter_by_symbol, load_bars, load_csv, load_dbn};
pub use normalize::normalize;
pub use record::OhlcvRecord;
