//! 目录树文本
//!
//! 分组请求的输入就是科目目录的 `tree` 输出。没有安装 `tree` 时用同样的格式自己画一份。

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::FileError;
use crate::infrastructure::inventory::EXCLUDED_DIRECTORY;

/// 生成目录树文本
pub async fn directory_tree(dir: &Path) -> Result<String, FileError> {
    match run_tree_command(dir).await {
        Ok(listing) => Ok(listing),
        Err(reason) => {
            warn!("tree 命令不可用 ({}), 使用内置目录树", reason);
            let owned = dir.to_path_buf();
            tokio::task::spawn_blocking(move || render_tree(&owned))
                .await
                .map_err(|e| FileError::ListingFailed {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                })?
        }
    }
}

async fn run_tree_command(dir: &Path) -> Result<String, String> {
    let output = Command::new("tree")
        .arg("-I")
        .arg(EXCLUDED_DIRECTORY)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(format!("退出码 {:?}", output.status.code()));
    }

    debug!("tree 输出 {} 字节", output.stdout.len());
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// 按 `tree` 的格式渲染目录
pub fn render_tree(dir: &Path) -> Result<String, FileError> {
    let mut out = String::from(".\n");
    let mut counts = (0usize, 0usize);
    render_children(dir, "", &mut out, &mut counts)?;
    out.push_str(&format!("\n{} directories, {} files\n", counts.0, counts.1));
    Ok(out)
}

fn render_children(
    dir: &Path,
    prefix: &str,
    out: &mut String,
    counts: &mut (usize, usize),
) -> Result<(), FileError> {
    let read_failed = |e| FileError::read_failed(dir.display().to_string(), e);

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        let is_dir = entry.file_type().map_err(read_failed)?.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir && name == EXCLUDED_DIRECTORY {
            continue;
        }
        entries.push((name, is_dir, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let last_index = entries.len().saturating_sub(1);
    for (index, (name, is_dir, path)) in entries.into_iter().enumerate() {
        let is_last = index == last_index;
        let connector = if is_last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&name);
        out.push('\n');

        if is_dir {
            counts.0 += 1;
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            render_children(&path, &child_prefix, out, counts)?;
        } else {
            counts.1 += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_render_tree_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("eA")).unwrap();
        fs::create_dir_all(root.join("~BROMIUM")).unwrap();
        fs::write(root.join("2016ChemieA1.md"), "").unwrap();
        fs::write(root.join("eA/2016ChemieA1L.md"), "").unwrap();
        fs::write(root.join("~BROMIUM/ghost.md"), "").unwrap();

        let listing = render_tree(root).unwrap();

        let expected = ".\n\
                        ├── 2016ChemieA1.md\n\
                        └── eA\n    \
                        └── 2016ChemieA1L.md\n\
                        \n1 directories, 2 files\n";
        assert_eq!(listing, expected);
    }

    #[tokio::test]
    async fn test_directory_tree_mentions_every_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2016ChemieA1.md"), "").unwrap();

        let listing = directory_tree(dir.path()).await.unwrap();
        assert!(listing.contains("2016ChemieA1.md"));
    }
}
