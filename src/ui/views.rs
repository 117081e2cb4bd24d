use crate::core::state::{Analysis, Idea, Script, Stage};

const STEPS: [&str; 3] = ["1. 분석", "2. 기획", "3. 대본"];

/// `1. 분석 → [2. 기획] → 3. 대본`, with the active step bracketed.
pub fn progress_header(stage: Stage) -> Option<String> {
    let active = stage.step()?;
    let parts: Vec<String> = STEPS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if i + 1 == active {
                format!("[{}]", label)
            } else {
                label.to_string()
            }
        })
        .collect();
    Some(parts.join(" → "))
}

pub fn render_input() -> String {
    "== 인기 동영상의 DNA를 훔치세요 ==\n\
     벤치마킹하고 싶은 유튜브 영상의 대본(스크립트)을 붙여넣으세요.\n\
     AI가 성공 요인을 분석하고 새로운 기획을 제안합니다.\n"
        .to_string()
}

pub fn busy_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Analyzing => "대본을 분석하는 중...",
        Stage::Ideating => "성공 공식을 기반으로 아이디어를 짜내는 중...",
        _ => "대본 작성 중...",
    }
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let mut lines = vec![
        "== 성공 공식 분석 ==".to_string(),
        format!("훅 전략: {}", analysis.hook_strategy),
        format!("떡상 요인: {}", analysis.viral_factor),
        format!("톤 & 스타일: {}", analysis.tone_style),
        format!("구조: {}", analysis.structure_breakdown),
        "이탈 방지 장치:".to_string(),
    ];
    lines.extend(
        analysis
            .retention_tactics
            .iter()
            .enumerate()
            .map(|(i, tactic)| format!("  {}. {}", i + 1, tactic)),
    );
    lines.push(format!("감정 트리거: {}", analysis.emotional_triggers.join(", ")));
    lines.join("\n") + "\n"
}

/// One-line label for an idea in a selection menu.
pub fn idea_label(index: usize, idea: &Idea, selected: bool) -> String {
    format!(
        "{}{}. {} (떡상 지수 {:.0})",
        if selected { "▶ " } else { "" },
        index + 1,
        idea.title,
        idea.predicted_viral_score
    )
}

pub fn render_ideas(ideas: &[Idea]) -> String {
    let mut out = String::from("== 새 영상 아이디어 ==\n");
    for (i, idea) in ideas.iter().enumerate() {
        out.push_str(&format!(
            "{}\n   {}\n   타겟: {}\n",
            idea_label(i, idea, false),
            idea.premise,
            idea.target_audience
        ));
    }
    out
}

pub fn render_script(script: &Script) -> String {
    let mut out = format!("== 완성된 대본 ==\n{}\n", script.title);
    for (i, section) in script.sections.iter().enumerate() {
        out.push_str(&format!(
            "\n--- Section {}: {} ---\n(화면 연출) {}\n{}\n",
            i + 1,
            section.heading,
            section.visual_cue,
            section.content
        ));
    }
    out
}
