// Regenerates `include/soundbed.h` with `cbindgen` when the tool is on PATH.
// Without it, the checked-in header is copied to $OUT_DIR unchanged so
// downstream build systems find it in the same place either way.

use std::{env, fs, io, path::PathBuf, process::Command};

fn cbindgen_available() -> bool {
    Command::new("cbindgen")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/soundbed.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").map_err(io::Error::other)?);
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(io::Error::other)?);
    let header_repo = crate_dir.join("include").join("soundbed.h");
    let header_out = out_dir.join("soundbed.h");

    if cbindgen_available() {
        let status = Command::new("cbindgen")
            .args(["--crate", "soundbed-ffi", "--lang", "C", "--output"])
            .arg(&header_out)
            .current_dir(&crate_dir)
            .status()?;
        if status.success() {
            fs::create_dir_all(crate_dir.join("include"))?;
            fs::copy(&header_out, &header_repo)?;
            return Ok(());
        }
        println!("cargo:warning=soundbed-ffi: cbindgen failed; using checked-in header");
    }

    fs::copy(&header_repo, &header_out)?;
    Ok(())
}
