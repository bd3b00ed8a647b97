// 构建脚本: 链接FFmpeg依赖库 (仅 camera 特性)
fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_CAMERA");

    if std::env::var_os("CARGO_FEATURE_CAMERA").is_none() {
        return;
    }

    // 仅在Windows MSVC环境下添加FFmpeg相关库
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // OLE 自动化和VFW (dshow 摄像头)
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        // Intel QSV (Quick Sync Video) 硬件加速
        println!("cargo:rustc-link-lib=dylib=libmfx");
    }
}
