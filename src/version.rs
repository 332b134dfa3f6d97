// Copyright (c) 2024 Mike Tsao

//! Build identification for command-line tools.

// https://stackoverflow.com/a/65972328/344467
/// The version-control description of this build if one was provided at
/// compile time, otherwise the crate version.
pub fn app_version() -> &'static str {
    option_env!("GIT_DESCRIBE")
        .unwrap_or(option_env!("GIT_REV_PARSE").unwrap_or(env!("CARGO_PKG_VERSION")))
}
