fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/shutter.proto");

    // Vendored protoc, so builds don't need one installed
    let protoc = protoc_bin_vendored::protoc_bin_path()?;
    std::env::set_var("PROTOC", protoc);

    // The coordinator dials agents with the generated client
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/shutter.proto"], &["proto"])?;
    Ok(())
}
