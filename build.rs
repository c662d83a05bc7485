use chrono::Utc;
use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

/// target/<profile> 目录（OUT_DIR 向上三级）
fn deploy_dir() -> Option<PathBuf> {
    let out_dir = std::env::var("OUT_DIR").ok()?;
    Path::new(&out_dir)
        .ancestors()
        .nth(3)
        .map(Path::to_path_buf)
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    println!("cargo:rerun-if-changed=config.yaml");
    println!("cargo:rerun-if-changed=config.example.yaml");

    set_build_metadata();

    let Some(deploy_dir) = deploy_dir() else {
        println!("cargo:warning=无法确定输出目录，跳过部署文件复制");
        return Ok(());
    };

    copy_config_files(&deploy_dir)?;
    create_runtime_directories(&deploy_dir)?;

    Ok(())
}

fn set_build_metadata() {
    let git_commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let build_version = fs::read_to_string("VERSION")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| git_commit.clone());

    println!("cargo:rustc-env=APP_BUILD_VERSION={}", build_version);
    println!("cargo:rustc-env=APP_BUILD_COMMIT={}", git_commit);
    println!("cargo:rustc-env=APP_BUILD_TIMESTAMP={}", Utc::now().to_rfc3339());
}

fn copy_config_files(deploy_dir: &Path) -> io::Result<()> {
    for file in ["config.yaml", "config.example.yaml"] {
        if Path::new(file).exists() {
            fs::copy(file, deploy_dir.join(file))?;
        }
    }
    Ok(())
}

// 暂存目录与日志目录
fn create_runtime_directories(deploy_dir: &Path) -> io::Result<()> {
    for dir in ["logs", "uploads"] {
        fs::create_dir_all(deploy_dir.join(dir))?;
    }
    Ok(())
}
