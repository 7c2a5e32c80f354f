//! State tracking for asynchronous scrape jobs
//!
//! # Components
//!
//! - `ScrapeStatus`: The job lifecycle reported by the poll endpoint (pending, complete, failed)
//! - `ScrapeJob`: The job handle announced by a `202 Accepted` logo response

mod scrape_state;

pub use scrape_state::{ScrapeJob, ScrapeStatus};
