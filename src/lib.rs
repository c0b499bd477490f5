//! A small Rust client for the DKAN open-data portal datastore search API.
//!
//! The crate builds a `datastore/search.json` query from filters, output
//! fields, full-text terms and a sort order, then walks the portal's
//! offset/limit pages and returns every requested record as one [`Table`].
//!
//! ## Quick start
//! - Pick the portal with `DKANAPI_URL`, a `.dkanapirc` file (current directory
//!   or home directory), or pass it to [`Client::new`].
//! - Describe the search with [`SearchQuery`] and call [`Client::search`].
//!
//! ```no_run
//! use dkanapi::{Client, SearchQuery, SortDirection};
//!
//! fn main() -> Result<(), dkanapi::Error> {
//!     let client = Client::new(Some("https://data.medicaid.gov".into()), None)?;
//!     let query = SearchQuery::new("d6d3e5ed-2a1b-4d7c-9fc3-5b2f4c1a7e90")
//!         .filter_fields(["state"])
//!         .filter_values([vec!["AK", "AL"]])
//!         .fields(["state", "year", "units_reimbursed"])
//!         .sort("year", SortDirection::Descending)
//!         .max_records(250);
//!
//!     let table = client.search(&query)?;
//!     println!("{} rows, columns {:?}", table.len(), table.columns());
//!     Ok(())
//! }
//! ```
//!
//! Requests are sent one at a time and nothing is retried: the first failing
//! page aborts the search with an [`Error`].

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod page;
mod query;
mod table;
mod transport;
mod util;

pub use client::{Client, ClientConfig};
pub use config::DEFAULT_URL;
pub use error::{Error, Result};
pub use query::{Escape, PAGE_SIZE, SearchQuery, SortDirection};
pub use table::Table;
pub use transport::{HttpTransport, Transport};
