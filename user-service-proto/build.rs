//! 生成 `proto/user_service.proto` 的 gRPC 服务端/客户端代码，
//! 并输出文件描述符集合供 gRPC 反射服务使用。

use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("user_service_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/user_service.proto"],
        &["proto"],
    )?;

    println!("cargo:rerun-if-changed=proto/user_service.proto");
    Ok(())
}
