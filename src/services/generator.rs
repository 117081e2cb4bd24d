use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::core::error::GenerationError;
use crate::core::state::{Analysis, Idea, Script};
use crate::services::credentials::CredentialStore;
use crate::services::llm::{GenerateRequest, LlmClient};
use crate::services::schema::{analysis_schema, ideas_schema, script_schema, ResponseSchema};
use crate::utils::text::{strip_code_blocks, truncate_chars};

pub const SYSTEM_INSTRUCTION: &str = "\
당신은 세계 최고의 유튜브 콘텐츠 전략가이자 전문 스크립트 작가입니다.
한국어로 소통하며, 인기 동영상의 성공 요인을 분석하고 그것을 기반으로 새로운 떡상 콘텐츠를 기획하는 능력이 탁월합니다.
항상 트렌디하고, 자극적이며, 시청 지속 시간을 극대화하는 방향으로 생각하십시오.";

pub const DEFAULT_SOURCE_LIMIT: usize = 15_000;

/// Runs the three model-backed transformations: analyze, ideate and script.
pub struct Generator {
    llm: Arc<dyn LlmClient>,
    credentials: Arc<CredentialStore>,
    source_limit: usize,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmClient>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            llm,
            credentials,
            source_limit: DEFAULT_SOURCE_LIMIT,
        }
    }

    pub fn with_source_limit(mut self, limit: usize) -> Self {
        self.source_limit = limit;
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub async fn analyze(&self, source_text: &str) -> Result<Analysis, GenerationError> {
        let credential = self.snapshot_credential()?;
        let instruction = analyze_prompt(source_text, self.source_limit);
        self.call(&credential, instruction, analysis_schema()).await
    }

    /// `_source_text` is accepted alongside the analysis but not sent; the analysis
    /// already carries everything the ideation prompt needs.
    pub async fn ideate(
        &self,
        analysis: &Analysis,
        _source_text: &str,
    ) -> Result<Vec<Idea>, GenerationError> {
        let credential = self.snapshot_credential()?;
        let instruction = ideate_prompt(analysis)?;
        self.call(&credential, instruction, ideas_schema()).await
    }

    pub async fn script(&self, idea: &Idea, analysis: &Analysis) -> Result<Script, GenerationError> {
        let credential = self.snapshot_credential()?;
        let instruction = script_prompt(idea, analysis)?;
        self.call(&credential, instruction, script_schema()).await
    }

    fn snapshot_credential(&self) -> Result<String, GenerationError> {
        self.credentials
            .get()
            .ok_or(GenerationError::MissingCredential)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        credential: &str,
        instruction: String,
        schema: ResponseSchema,
    ) -> Result<T, GenerationError> {
        log::debug!("Sending instruction ({} chars)", instruction.chars().count());
        let request = GenerateRequest {
            instruction,
            system: SYSTEM_INSTRUCTION.to_string(),
            schema,
        };

        let text = self
            .llm
            .generate(credential, &request)
            .await
            .map_err(GenerationError::GenerationFailed)?;

        parse_validated(&text, &request.schema)
    }
}

/// Parses model text against `schema` before building the typed artifact.
pub fn parse_validated<T: DeserializeOwned>(text: &str, schema: &ResponseSchema) -> Result<T, GenerationError> {
    let clean = strip_code_blocks(text);
    if clean.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let value: serde_json::Value = serde_json::from_str(clean)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    schema
        .validate(&value)
        .map_err(GenerationError::MalformedResponse)?;
    serde_json::from_value(value).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

pub fn analyze_prompt(source_text: &str, limit: usize) -> String {
    format!(
        "다음은 유튜브에서 큰 인기를 끈 영상의 대본입니다. 이 대본을 분석하여 왜 성공했는지 '성공 공식'을 추출해 주세요.\n\
        다음 항목들을 분석해 JSON 형식으로 반환해 주세요:\n\
        \n\
        1. hookStrategy: 초반 5-10초에 시청자를 사로잡은 핵심 전략 (한 문장).\n\
        2. retentionTactics: 시청 이탈을 막기 위해 사용된 장치들 (3개 이하의 문자열 배열).\n\
        3. emotionalTriggers: 자극된 주요 감정들 (예: 호기심, 분노, 공감 등) (배열).\n\
        4. structureBreakdown: 서론-본론-결론의 흐름과 템포에 대한 요약.\n\
        5. viralFactor: 이 영상이 알고리즘의 선택을 받은 결정적인 '떡상 요인' 한 가지.\n\
        6. toneStyle: 화자의 톤, 말투, 영상의 분위기.\n\
        \n\
        대본:\n{}",
        truncate_chars(source_text, limit)
    )
}

pub fn ideate_prompt(analysis: &Analysis) -> Result<String, GenerationError> {
    let analysis_json = to_json(analysis)?;
    Ok(format!(
        "우리가 방금 분석한 인기 영상의 성공 공식(Analysis)을 바탕으로,\n\
        완전히 새로운 주제의 유튜브 영상 아이디어 4가지를 제안해 주세요.\n\
        \n\
        분석된 성공 공식:\n{}\n\
        \n\
        원래 대본의 주제와는 다르지만, 동일한 '구조적 재미'와 '몰입감'을 줄 수 있는 아이디어여야 합니다.\n\
        \n\
        각 아이디어는 다음 필드를 가집니다:\n\
        1. title: 클릭을 유도하는 자극적이고 매력적인 썸네일용 제목.\n\
        2. premise: 영상의 핵심 내용과 기획 의도.\n\
        3. targetAudience: 주 타겟 시청층.\n\
        4. predictedViralScore: 예상되는 떡상 지수 (1-100 사이 숫자).",
        analysis_json
    ))
}

pub fn script_prompt(idea: &Idea, analysis: &Analysis) -> Result<String, GenerationError> {
    let analysis_json = to_json(analysis)?;
    let idea_json = to_json(idea)?;
    Ok(format!(
        "당신이 제안한 아이디어 \"{}\"를 바탕으로 실제 유튜브 촬영용 대본을 작성해 주세요.\n\
        가장 중요한 것은 앞서 분석한 성공 공식(Analysis)의 구조, 톤앤매너, 훅 전략을 그대로 적용하는 것입니다.\n\
        \n\
        분석된 성공 스타일:\n{}\n\
        \n\
        아이디어 정보:\n{}\n\
        \n\
        대본은 JSON 형식으로 반환해야 하며, 각 섹션(서론, 본론1, 본론2, 결론 등)으로 나누어 주세요.\n\
        각 섹션은 heading(소제목), content(실제 대사), visualCue(화면 연출 지시문)를 포함합니다.\n\
        대사는 구어체로 아주 자연스럽게 작성하세요.",
        idea.title, analysis_json, idea_json
    ))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, GenerationError> {
    serde_json::to_string(value).map_err(|e| GenerationError::GenerationFailed(e.into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::io::MemoryStorage;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    pub(crate) fn sample_analysis() -> Analysis {
        Analysis {
            hook_strategy: "첫 5초에 결과부터 보여준다".to_string(),
            retention_tactics: vec!["중간 반전".to_string(), "질문 던지기".to_string()],
            emotional_triggers: vec!["호기심".to_string(), "공감".to_string()],
            structure_breakdown: "빠른 도입, 세 단계 전개, 짧은 결론".to_string(),
            viral_factor: "예상 밖의 결말".to_string(),
            tone_style: "친근한 반말".to_string(),
        }
    }

    pub(crate) fn sample_idea(n: usize) -> Idea {
        Idea {
            title: format!("아이디어 {}", n),
            premise: format!("전제 {}", n),
            target_audience: "20대 직장인".to_string(),
            predicted_viral_score: 80.0 + n as f64,
        }
    }

    const ANALYSIS_JSON: &str = r#"{
        "hookStrategy": "h",
        "retentionTactics": ["a"],
        "emotionalTriggers": ["b"],
        "structureBreakdown": "s",
        "viralFactor": "v",
        "toneStyle": "t"
    }"#;

    #[derive(Debug, Default)]
    struct RecordingLlm {
        reply: String,
        calls: Mutex<Vec<(String, GenerateRequest)>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn generate(&self, credential: &str, request: &GenerateRequest) -> anyhow::Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((credential.to_string(), request.clone()));
            Ok(self.reply.clone())
        }
    }

    #[derive(Debug)]
    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn generate(&self, _: &str, _: &GenerateRequest) -> anyhow::Result<String> {
            Err(anyhow!("connection reset"))
        }
    }

    /// Holds every call open until `release` is notified.
    #[derive(Debug, Default)]
    struct GatedLlm {
        entered: Notify,
        release: Notify,
        credentials: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for GatedLlm {
        async fn generate(&self, credential: &str, _: &GenerateRequest) -> anyhow::Result<String> {
            self.credentials.lock().unwrap().push(credential.to_string());
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ANALYSIS_JSON.to_string())
        }
    }

    async fn generator_with(llm: Arc<dyn LlmClient>, credential: Option<&str>) -> Generator {
        let store = CredentialStore::load(Arc::new(MemoryStorage::new()))
            .await
            .unwrap();
        if let Some(token) = credential {
            store.set(token).await.unwrap();
        }
        Generator::new(llm, Arc::new(store))
    }

    fn recording(reply: &str) -> Arc<RecordingLlm> {
        Arc::new(RecordingLlm {
            reply: reply.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_missing_credential_blocks_call() {
        let llm = recording(ANALYSIS_JSON);
        let generator = generator_with(llm.clone(), None).await;

        let err = generator.analyze("대본").await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingCredential));
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_returns_validated_analysis() {
        let llm = recording(ANALYSIS_JSON);
        let generator = generator_with(llm.clone(), Some("key")).await;

        let analysis = generator.analyze("안녕하세요, 오늘은 제가...").await.unwrap();
        assert_eq!(analysis.hook_strategy, "h");
        assert_eq!(analysis.tone_style, "t");

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls[0].0, "key");
        assert_eq!(calls[0].1.system, SYSTEM_INSTRUCTION);
        assert_eq!(calls[0].1.schema, analysis_schema());
    }

    #[tokio::test]
    async fn test_analyze_truncates_source() {
        let llm = recording(ANALYSIS_JSON);
        let generator = generator_with(llm.clone(), Some("key")).await;

        let source = format!("{}{}", "a".repeat(15_000), "☃".repeat(5_000));
        generator.analyze(&source).await.unwrap();

        let calls = llm.calls.lock().unwrap();
        let instruction = &calls[0].1.instruction;
        assert!(instruction.contains(&"a".repeat(15_000)));
        assert!(!instruction.contains('☃'));
    }

    #[test]
    fn test_analyze_prompt_respects_custom_limit() {
        let prompt = analyze_prompt("가나다라마", 3);
        assert!(prompt.ends_with("가나다"));
    }

    #[tokio::test]
    async fn test_ideate_embeds_analysis_json() {
        let llm = recording(
            r#"[{"title":"t","premise":"p","targetAudience":"a","predictedViralScore":91}]"#,
        );
        let generator = generator_with(llm.clone(), Some("key")).await;
        let analysis = sample_analysis();

        let ideas = generator.ideate(&analysis, "unused source").await.unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].predicted_viral_score, 91.0);

        let calls = llm.calls.lock().unwrap();
        let instruction = &calls[0].1.instruction;
        assert!(instruction.contains(&serde_json::to_string(&analysis).unwrap()));
        assert!(!instruction.contains("unused source"));
    }

    #[tokio::test]
    async fn test_script_embeds_idea_and_analysis() {
        let llm = recording(
            r#"```json
            {"title":"대본","sections":[{"heading":"서론","content":"안녕","visualCue":"클로즈업"}]}
            ```"#,
        );
        let generator = generator_with(llm.clone(), Some("key")).await;
        let idea = sample_idea(1);
        let analysis = sample_analysis();

        let script = generator.script(&idea, &analysis).await.unwrap();
        assert_eq!(script.sections[0].visual_cue, "클로즈업");

        let calls = llm.calls.lock().unwrap();
        let instruction = &calls[0].1.instruction;
        assert!(instruction.contains(&serde_json::to_string(&idea).unwrap()));
        assert!(instruction.contains(&serde_json::to_string(&analysis).unwrap()));
    }

    #[tokio::test]
    async fn test_empty_text_is_empty_response() {
        let generator = generator_with(recording("  "), Some("key")).await;
        let err = generator.analyze("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_missing_field_is_malformed() {
        let generator = generator_with(recording(r#"{"hookStrategy":"h"}"#), Some("key")).await;
        match generator.analyze("x").await {
            Err(GenerationError::MalformedResponse(msg)) => {
                assert!(msg.contains("retentionTactics"), "{}", msg)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_is_malformed() {
        let generator = generator_with(recording("죄송합니다, 분석할 수 없습니다."), Some("key")).await;
        let err = generator.analyze("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_sections_is_malformed() {
        let generator = generator_with(recording(r#"{"title":"t","sections":[]}"#), Some("key")).await;
        let err = generator
            .script(&sample_idea(0), &sample_analysis())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_generation_failed() {
        let generator = generator_with(Arc::new(FailingLlm), Some("key")).await;
        let err = generator.analyze("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::GenerationFailed(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_in_flight_call_keeps_credential_snapshot() {
        let llm = Arc::new(GatedLlm::default());
        let generator = generator_with(llm.clone(), Some("old")).await;

        let replace_key = async {
            llm.entered.notified().await;
            generator.credentials().set("new").await.unwrap();
            llm.release.notify_one();
        };
        let (result, ()) = tokio::join!(generator.analyze("대본"), replace_key);
        result.unwrap();
        assert_eq!(*llm.credentials.lock().unwrap(), vec!["old".to_string()]);

        llm.release.notify_one();
        generator.analyze("대본").await.unwrap();
        assert_eq!(
            *llm.credentials.lock().unwrap(),
            vec!["old".to_string(), "new".to_string()]
        );
    }
}
