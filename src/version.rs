//! Build information. Values are injected at compile time through the
//! `TRANSPONDER_*` environment variables.

pub const VERSION: &str = match option_env!("TRANSPONDER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

pub const COMMIT: &str = match option_env!("TRANSPONDER_COMMIT") {
    Some(v) => v,
    None => "",
};

pub const BUILD_DATE: &str = match option_env!("TRANSPONDER_BUILD_DATE") {
    Some(v) => v,
    None => "",
};

pub const RUSTC_VERSION: &str = env!("TRANSPONDER_RUSTC_VERSION");

pub fn platform() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

pub fn to_string(verbose: bool) -> String {
    let mut out = format!("Transponder version: {} {}", VERSION, platform());
    if verbose {
        out.push_str(&format!("\n  Commit: {}", COMMIT));
        out.push_str(&format!("\n  Built: {}", BUILD_DATE));
        out.push_str(&format!("\n  Rust: {}", RUSTC_VERSION));
    }
    out
}
