fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/ml_service.proto");

    tonic_build::configure()
        .build_client(false)
        .compile_protos(&["proto/ml_service.proto"], &["proto"])?;

    Ok(())
}
