use std::env;
use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_build::configure().compile_protos(&["proto/helloworld.proto"], &["proto"])?;

    // Surfaced by `transponder version --verbose`.
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
    println!("cargo:rustc-env=TRANSPONDER_RUSTC_VERSION={}", rustc_version);
    println!("cargo:rerun-if-changed=proto/helloworld.proto");
    println!("cargo:rerun-if-env-changed=TRANSPONDER_VERSION");
    println!("cargo:rerun-if-env-changed=TRANSPONDER_COMMIT");
    println!("cargo:rerun-if-env-changed=TRANSPONDER_BUILD_DATE");
    Ok(())
}
