mod order;
mod resolve;

pub use order::{select_latest, select_update_candidate, sort_by_file_name_desc};
pub use resolve::PackageResolver;

#[cfg(test)]
mod tests;
