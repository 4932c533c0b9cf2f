//! Revalidator.
//!
//! A command line front end to query JSON documents over HTTP through a revalidator, to observe
//! its caching, deduplication and revalidation behavior.

mod cli;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            revalidator::logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
