//! Terminal display utilities: styled tables, progress bars and a
//! color theme that honors `NO_COLOR`.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{TableBuilder, create_build_summary_table, create_hits_table, create_status_table};
pub use theme::{THEME, Theme};
