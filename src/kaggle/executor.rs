use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use std::path::Path;
use tokio::process::Command;

/// One `kaggle` invocation. Non-zero exit with no stdout is a failure;
/// stdout from a failed exit is still returned because the CLI prints
/// status text before some of its error exits and callers inspect it.
pub async fn run_kaggle(args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("kaggle");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            eyre!("kaggle CLI not found. Install it with `pip install kaggle`.")
        } else {
            eyre!("failed to run kaggle: {e}")
        }
    })?;

    interpret(
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        &String::from_utf8_lossy(&output.stderr),
    )
}

fn interpret(success: bool, stdout: String, stderr: &str) -> Result<String> {
    if success {
        return Ok(stdout);
    }
    if !stdout.trim().is_empty() {
        tracing::warn!("kaggle exited non-zero: {}", stderr.trim());
        return Ok(stdout);
    }
    if stderr.contains("kaggle.json") || stderr.contains("credentials") || stderr.contains("401") {
        return Err(eyre!(
            "Kaggle credentials unavailable. Set KAGGLE_USERNAME and KAGGLE_KEY \
             or create ~/.kaggle/kaggle.json."
        ));
    }
    Err(eyre!("kaggle command failed: {}", stderr.trim()))
}

/// Seam between the run tracker and the external tool, so the poll loop
/// and resolver can be driven by a scripted double in tests.
#[async_trait]
pub trait KernelCli: Send + Sync {
    async fn check_available(&self) -> Result<String>;
    async fn push_kernel(&self, root: &Path) -> Result<String>;
    async fn kernel_status(&self, kernel_ref: &str) -> Result<String>;
    async fn download_outputs(&self, kernel_ref: &str, dest: &Path) -> Result<()>;
    async fn download_dataset(&self, dataset_ref: &str, dest: &Path) -> Result<()>;
    async fn submit_competition(&self, competition: &str, file: &Path, message: &str)
        -> Result<String>;
}

pub struct KaggleExecutor;

#[async_trait]
impl KernelCli for KaggleExecutor {
    async fn check_available(&self) -> Result<String> {
        run_kaggle(&["--version"], None)
            .await
            .map(|s| s.trim().to_string())
    }

    async fn push_kernel(&self, root: &Path) -> Result<String> {
        run_kaggle(&["kernels", "push", "-p", "."], Some(root)).await
    }

    async fn kernel_status(&self, kernel_ref: &str) -> Result<String> {
        run_kaggle(&["kernels", "status", kernel_ref], None).await
    }

    async fn download_outputs(&self, kernel_ref: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        run_kaggle(&["kernels", "output", kernel_ref, "-p", &dest], None)
            .await
            .map(|_| ())
    }

    async fn download_dataset(&self, dataset_ref: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        run_kaggle(
            &["datasets", "download", dataset_ref, "-p", &dest, "--unzip"],
            None,
        )
        .await
        .map(|_| ())
    }

    async fn submit_competition(
        &self,
        competition: &str,
        file: &Path,
        message: &str,
    ) -> Result<String> {
        let file = file.to_string_lossy();
        run_kaggle(
            &[
                "competitions",
                "submit",
                "-c",
                competition,
                "-f",
                &file,
                "-m",
                message,
            ],
            None,
        )
        .await
    }
}

pub async fn open_in_browser(url: &str) -> Result<()> {
    let (cmd, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C", "start", url])
    } else {
        ("xdg-open", vec![url])
    };
    Command::new(cmd)
        .args(&args)
        .spawn()
        .map_err(|e| eyre!("Failed to open browser: {e}"))?;
    Ok(())
}
