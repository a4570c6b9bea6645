extern crate cc;
use std::env;
use std::path::Path;

const BLOSSOM_V_DIR: &str = "./blossomV";
const BLOSSOM_V_SOURCES: [&str; 10] = [
    "blossomV.cpp",
    "PMinterface.cpp",
    "PMduals.cpp",
    "PMexpand.cpp",
    "PMinit.cpp",
    "PMmain.cpp",
    "PMrepair.cpp",
    "PMshrink.cpp",
    "misc.cpp",
    "MinCost/MinCost.cpp",
];

fn main() {
    // the serial solver is always available; blossom V is compiled only when its sources are present
    let header = format!("{BLOSSOM_V_DIR}/PerfectMatching.h");
    if cfg!(feature = "remove_blossom_v") || !Path::new(&header).exists() {
        return;
    }
    println!("cargo:rustc-cfg=feature=\"blossom_v\"");
    let is_macos = env::var("CARGO_CFG_TARGET_OS").map_or(false, |os| os == "macos");

    let mut build = cc::Build::new();
    build.cpp(true);
    for source in BLOSSOM_V_SOURCES.iter() {
        build.file(format!("{BLOSSOM_V_DIR}/{source}"));
    }
    if !is_macos {
        build.cpp_link_stdlib("stdc++");
        build.flag("-Wno-unused-but-set-variable"); // gcc only
    }
    build
        .flag("-Wno-unused-parameter")
        .flag("-Wno-unused-variable")
        .flag("-Wno-reorder-ctor")
        .flag("-Wno-reorder")
        .compile("blossomV");

    println!("cargo:rerun-if-changed={BLOSSOM_V_DIR}/blossomV.cpp");
    println!("cargo:rerun-if-changed={header}");
    println!("cargo:rustc-link-lib=static=blossomV");
    if !is_macos {
        // must follow the static blossomV link line
        println!("cargo:rustc-link-lib=dylib=stdc++");
    }
}
