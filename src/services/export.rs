use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::state::Script;
use crate::utils::text::underscore_whitespace;

/// Plain-text form used for "copy".
pub fn clipboard_text(script: &Script) -> String {
    script
        .sections
        .iter()
        .map(|s| format!("[{}]\n(화면: {})\n{}\n", s.heading, s.visual_cue, s.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn markdown(script: &Script) -> String {
    script
        .sections
        .iter()
        .map(|s| format!("### {}\n**Visual:** {}\n\n{}\n", s.heading, s.visual_cue, s.content))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn export_file_name(script: &Script) -> String {
    format!("{}_script.md", underscore_whitespace(&script.title))
}

/// Writes the Markdown export into `folder`, returning the file path.
pub async fn export_markdown(script: &Script, folder: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(folder)
        .await
        .with_context(|| format!("Failed to create {}", folder.display()))?;
    let path = folder.join(export_file_name(script));
    tokio::fs::write(&path, markdown(script))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Script exported to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Section;

    fn sample() -> Script {
        Script {
            title: "나만 몰랐던  꿀팁".to_string(),
            sections: vec![
                Section {
                    heading: "서론".to_string(),
                    content: "여러분 이거 아셨어요?".to_string(),
                    visual_cue: "클로즈업".to_string(),
                },
                Section {
                    heading: "결론".to_string(),
                    content: "구독 부탁드려요".to_string(),
                    visual_cue: "엔딩 카드".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_clipboard_text() {
        assert_eq!(
            clipboard_text(&sample()),
            "[서론]\n(화면: 클로즈업)\n여러분 이거 아셨어요?\n\n[결론]\n(화면: 엔딩 카드)\n구독 부탁드려요\n"
        );
    }

    #[test]
    fn test_markdown() {
        assert_eq!(
            markdown(&sample()),
            "### 서론\n**Visual:** 클로즈업\n\n여러분 이거 아셨어요?\n\n---\n### 결론\n**Visual:** 엔딩 카드\n\n구독 부탁드려요\n"
        );
    }

    #[tokio::test]
    async fn test_export_markdown_writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("output");

        let path = export_markdown(&sample(), &folder).await?;
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("나만_몰랐던_꿀팁_script.md")
        );
        assert_eq!(std::fs::read_to_string(&path)?, markdown(&sample()));
        Ok(())
    }
}
