use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::InquireError;
use inquire::{Confirm, Editor, Password, PasswordDisplayMode, Select, Text};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::core::config::Config;
use crate::core::error::WorkflowError;
use crate::core::state::{Script, Stage};
use crate::services::credentials::{CredentialStore, CREDENTIAL_HELP_URL};
use crate::services::export;
use crate::services::workflow::{Transition, WorkflowManager};
use crate::ui::views;

const RESET_PROMPT: &str = "처음으로 돌아가시겠습니까? 현재 작업 내용은 사라집니다.";
const MENU_CREDENTIAL: &str = "API 키 관리";
const MENU_RESET: &str = "처음으로";
const MENU_QUIT: &str = "종료";

/// Interactive terminal front end over a [`WorkflowManager`].
pub struct App {
    config: Config,
    manager: WorkflowManager,
}

impl App {
    pub fn new(config: Config, manager: WorkflowManager) -> Self {
        Self { config, manager }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("TubeAlchemy - 인기 영상의 성공 공식으로 새 대본 만들기");

        if !self.credentials().is_present() {
            println!("API 키가 설정되지 않았습니다.");
            manage_credential(self.credentials()).await?;
        }

        loop {
            let stage = self.manager.workflow().stage();
            if let Some(header) = views::progress_header(stage) {
                println!("\n{}", header);
            }
            if let Some(notice) = self.manager.workflow().notice() {
                println!("오류: {}", notice);
            }

            let keep_going = match stage {
                Stage::Input => self.input_step().await?,
                Stage::AnalysisReady => self.analysis_step().await?,
                Stage::IdeasReady => self.ideas_step().await?,
                Stage::ScriptReady => self.script_step().await?,
                // calls are awaited in place, so a busy stage is never observed here
                busy => {
                    log::debug!("Ignoring busy stage {} in menu loop", busy);
                    true
                }
            };

            if !keep_going {
                println!("종료합니다.");
                return Ok(());
            }
        }
    }

    fn credentials(&self) -> &CredentialStore {
        self.manager.generator().credentials()
    }

    async fn input_step(&mut self) -> Result<bool> {
        println!("{}", views::render_input());
        let options = vec![
            "대본 붙여넣기 (편집기)",
            "파일에서 불러오기",
            MENU_CREDENTIAL,
            MENU_QUIT,
        ];
        let Some(choice) = select("인기 영상의 대본을 입력하세요", options)? else {
            return Ok(false);
        };

        let text = match choice {
            0 => {
                let initial = self.manager.workflow().source_text().to_string();
                match Editor::new("대본")
                    .with_predefined_text(&initial)
                    .with_help_message("여기에 대본을 붙여넣으세요... (예: 안녕하세요, 오늘은 제가...)")
                    .prompt()
                {
                    Ok(text) => text,
                    Err(InquireError::OperationCanceled) => return Ok(true),
                    Err(e) => {
                        log::warn!("Editor prompt failed: {}", e);
                        println!("편집기를 열 수 없습니다: {}", e);
                        println!("'파일에서 불러오기'를 사용하거나 EDITOR 환경 변수를 확인하세요.");
                        return Ok(true);
                    }
                }
            }
            1 => {
                let Some(path) = optional(Text::new("대본 파일 경로:").prompt())? else {
                    return Ok(true);
                };
                match tokio::fs::read_to_string(path.trim()).await {
                    Ok(text) => text,
                    Err(e) => {
                        println!("파일을 읽을 수 없습니다: {}", e);
                        return Ok(true);
                    }
                }
            }
            2 => {
                manage_credential(self.credentials()).await?;
                return Ok(true);
            }
            _ => return Ok(false),
        };

        let outcome = with_spinner(
            views::busy_message(Stage::Analyzing),
            self.manager.submit(&text),
        )
        .await?;
        report(outcome);
        Ok(true)
    }

    async fn analysis_step(&mut self) -> Result<bool> {
        if let Some(analysis) = self.manager.workflow().analysis() {
            println!("{}", views::render_analysis(analysis));
        }

        let options = vec!["이 공식으로 아이디어 생성하기", MENU_RESET, MENU_CREDENTIAL, MENU_QUIT];
        match select("다음 단계", options)? {
            Some(0) => {
                let outcome = with_spinner(
                    views::busy_message(Stage::Ideating),
                    self.manager.proceed(),
                )
                .await?;
                report(outcome);
                Ok(true)
            }
            Some(1) => {
                self.manager.reset(confirm_reset);
                Ok(true)
            }
            Some(2) => {
                manage_credential(self.credentials()).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ideas_step(&mut self) -> Result<bool> {
        let ideas = self.manager.workflow().ideas().to_vec();
        println!("{}", views::render_ideas(&ideas));

        let mut options: Vec<String> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| views::idea_label(i, idea, false))
            .collect();
        options.extend([MENU_RESET, MENU_CREDENTIAL, MENU_QUIT].map(String::from));

        let Some(choice) = select("대본을 쓸 아이디어를 선택하세요", options)? else {
            return Ok(false);
        };
        match choice.checked_sub(ideas.len()) {
            None => {
                let outcome = with_spinner(
                    views::busy_message(Stage::Scripting),
                    self.manager.choose(choice),
                )
                .await?;
                report(outcome);
            }
            Some(0) => {
                self.manager.reset(confirm_reset);
            }
            Some(1) => manage_credential(self.credentials()).await?,
            Some(_) => return Ok(false),
        }
        Ok(true)
    }

    async fn script_step(&mut self) -> Result<bool> {
        let Some(script) = self.manager.workflow().script().cloned() else {
            return Ok(true);
        };
        println!("{}", views::render_script(&script));

        let options = vec![
            "복사 (텍스트 출력)",
            "마크다운으로 저장",
            "다른 아이디어로 다시 쓰기",
            MENU_RESET,
            MENU_CREDENTIAL,
            MENU_QUIT,
        ];
        match select("대본 작업", options)? {
            Some(0) => {
                println!("----- 복사용 텍스트 -----");
                println!("{}", export::clipboard_text(&script));
                println!("-------------------------");
            }
            Some(1) => {
                let folder = Path::new(&self.config.export_folder);
                println!("{}", export_script(&script, folder).await);
            }
            Some(2) => self.choose_other_idea().await?,
            Some(3) => {
                self.manager.reset(confirm_reset);
            }
            Some(4) => manage_credential(self.credentials()).await?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn choose_other_idea(&mut self) -> Result<()> {
        let workflow = self.manager.workflow();
        let selected = workflow.selected_idea().cloned();
        let options: Vec<String> = workflow
            .ideas()
            .iter()
            .enumerate()
            .map(|(i, idea)| views::idea_label(i, idea, selected.as_ref() == Some(idea)))
            .collect();

        if let Some(index) = select("다른 아이디어 선택", options)? {
            let outcome = with_spinner(
                views::busy_message(Stage::Scripting),
                self.manager.choose_other(index),
            )
            .await?;
            report(outcome);
        }
        Ok(())
    }
}

/// Save, replace or clear the stored API credential.
pub async fn manage_credential(store: &CredentialStore) -> Result<()> {
    loop {
        let status = if store.is_present() {
            "API 키가 저장되어 있습니다."
        } else {
            "API 키 설정 필요"
        };
        println!("{}", status);

        let mut options = vec!["저장하기"];
        if store.is_present() {
            options.push("삭제");
        }
        options.push("닫기");

        match select("Gemini API 키 설정", options.clone())?.map(|i| options[i]) {
            Some("저장하기") => {
                let help = format!("Google AI Studio에서 발급받은 API 키를 입력하세요: {}", CREDENTIAL_HELP_URL);
                let Some(key) = optional(
                    Password::new("API 키:")
                        .with_display_mode(PasswordDisplayMode::Masked)
                        .with_display_toggle_enabled()
                        .without_confirmation()
                        .with_help_message(&help)
                        .prompt(),
                )?
                else {
                    continue;
                };
                if save_credential(store, &key).await {
                    return Ok(());
                }
            }
            Some("삭제") => {
                if confirm("저장된 API 키를 삭제하시겠습니까?") {
                    clear_credential(store).await;
                }
            }
            _ => return Ok(()),
        }
    }
}

/// Stores `key`, printing the outcome. Returns whether the key was saved.
async fn save_credential(store: &CredentialStore, key: &str) -> bool {
    match store.set(key).await {
        Ok(()) => {
            println!("저장됨");
            true
        }
        Err(e) => {
            log::warn!("Credential not saved: {}", e);
            println!("{}", e);
            false
        }
    }
}

async fn clear_credential(store: &CredentialStore) -> bool {
    match store.clear().await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Credential not cleared: {}", e);
            println!("API 키를 삭제하지 못했습니다: {}", e);
            false
        }
    }
}

/// Writes the Markdown export and returns the line to show the user.
async fn export_script(script: &Script, folder: &Path) -> String {
    match export::export_markdown(script, folder).await {
        Ok(path) => format!("저장됨: {}", path.display()),
        Err(e) => {
            log::warn!("Export failed: {:#}", e);
            format!("내보내기 실패: {:#}", e)
        }
    }
}

fn report(outcome: Result<Transition, WorkflowError>) {
    match outcome {
        Ok(Transition::RolledBack(_)) => println!("작업 중 오류가 발생했습니다. 다시 시도해주세요."),
        Ok(_) => {}
        Err(e) => println!("{}", e),
    }
}

fn confirm_reset() -> bool {
    confirm(RESET_PROMPT)
}

fn confirm(message: &str) -> bool {
    Confirm::new(message)
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}

/// Index of the chosen option, or `None` when the prompt was cancelled.
fn select<T: std::fmt::Display>(message: &str, options: Vec<T>) -> Result<Option<usize>> {
    Ok(optional(Select::new(message, options).raw_prompt())?.map(|choice| choice.index))
}

fn optional<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn with_spinner<F: Future>(message: &str, future: F) -> Result<F::Output> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    let output = future.await;
    pb.finish_and_clear();
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::Storage;
    use crate::core::state::Section;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Holds a credential but rejects every write.
    struct ReadOnlyStorage;

    #[async_trait]
    impl Storage for ReadOnlyStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(Some("old".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("read-only file system"))
        }
        async fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow!("read-only file system"))
        }
    }

    fn sample_script() -> Script {
        Script {
            title: "제목".to_string(),
            sections: vec![Section {
                heading: "서론".to_string(),
                content: "안녕하세요".to_string(),
                visual_cue: "클로즈업".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_credential_storage_failure_keeps_app_running() {
        let store = CredentialStore::load(Arc::new(ReadOnlyStorage)).await.unwrap();

        assert!(!save_credential(&store, "new").await);
        assert_eq!(store.get().as_deref(), Some("old"));

        assert!(!clear_credential(&store).await);
        assert!(store.is_present());

        assert!(!save_credential(&store, "   ").await);
    }

    #[tokio::test]
    async fn test_export_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_folder = dir.path().join("output");
        std::fs::write(&not_a_folder, "file in the way").unwrap();

        let message = export_script(&sample_script(), &not_a_folder).await;
        assert!(message.starts_with("내보내기 실패"), "{}", message);

        let message = export_script(&sample_script(), &dir.path().join("scripts")).await;
        assert!(message.starts_with("저장됨"), "{}", message);
        assert!(dir.path().join("scripts").join("제목_script.md").exists());
    }
}
