fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the bundled protoc so the build does not depend on a system install
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    println!("cargo:rerun-if-changed=../../proto/rating.proto");
    tonic_build::compile_protos("../../proto/rating.proto")?;
    Ok(())
}
