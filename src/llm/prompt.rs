//! Prompt builder for paper interpretation and podcast scripts.
//!
//! [`PromptBuilder`] produces `(system_msg, user_msg)` pairs for any
//! OpenAI-compatible `/chat/completions` endpoint.  Chinese (`"zh"`) and
//! English (`"en"`) have dedicated instructions; any other language code
//! falls back to English.
//!
//! Inputs are cut to fixed character budgets before they are embedded so a
//! long paper never overruns the model's context window.

use crate::extract::truncate_chars;
use crate::pipeline::Extraction;

/// Abstract characters embedded in an interpretation prompt.
pub const ABSTRACT_BUDGET: usize = 4000;
/// Body-text characters embedded in an interpretation prompt.
pub const RAW_PREVIEW_BUDGET: usize = 6000;
/// Interpretation characters embedded in a script prompt.
pub const SCRIPT_INPUT_BUDGET: usize = 12000;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const INTERPRET_SYSTEM_ZH: &str = "\
你是一位学术论文解读助手。请根据用户给出的论文信息，生成一份结构化的中文解读报告（Markdown 格式）。
只输出 Markdown 正文，不要输出代码块标记。";

const INTERPRET_SYSTEM_EN: &str = "\
You are an assistant that explains academic papers.
Write a structured report in Markdown based on the paper information the user provides.
Reply with the Markdown body only, without code fences.";

const SCRIPT_SYSTEM_ZH: &str = "\
你是一位播客撰稿人，负责把论文解读报告改写成适合朗读的口语化稿件。
只输出播客稿正文，不要输出代码块或额外说明。";

const SCRIPT_SYSTEM_EN: &str = "\
You are a podcast writer who turns paper reports into a script meant to be read aloud.
Reply with the script body only, without code fences or commentary.";

// ---------------------------------------------------------------------------
// Output structure
// ---------------------------------------------------------------------------

const SECTIONS_ZH: [&str; 7] = [
    "研究背景与动机",
    "问题定义与目标",
    "方法/技术路线概述",
    "主要结果与实验结论",
    "创新点与贡献",
    "局限性与未来工作",
    "一句话总结",
];

const SECTIONS_EN: [&str; 7] = [
    "Background and motivation",
    "Problem definition and goals",
    "Method overview",
    "Main results and findings",
    "Contributions",
    "Limitations and future work",
    "One-sentence summary",
];

const SCRIPT_RULES_ZH: &str = "\
要求：
- 开场白：简要介绍「今天要聊的论文是……」
- 分段清晰，每段 2-4 句，便于朗读
- 使用口语化表达，避免生硬书面语
- 结尾有简短收束语
- 总字数控制在 2000 字以内，便于约 15 分钟播客";

const SCRIPT_RULES_EN: &str = "\
Requirements:
- Open by briefly introducing the paper we are discussing today
- Short paragraphs of 2-4 sentences each, easy to read aloud
- Conversational wording, no stiff academic phrasing
- End with a brief wrap-up
- Keep it under 2000 words, roughly a 15-minute episode";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds interpretation and script prompts as chat-message pairs.
///
/// # Example
/// ```rust
/// use paper_axon::llm::PromptBuilder;
/// use paper_axon::pipeline::Extraction;
///
/// let builder = PromptBuilder::new("en");
/// let extraction = Extraction {
///     title: "Attention Is All You Need".into(),
///     ..Extraction::default()
/// };
/// let (system, user) = builder.interpretation(&extraction);
/// assert!(system.contains("Markdown"));
/// assert!(user.contains("Attention Is All You Need"));
/// ```
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    /// Create a builder for the given ISO-639-1 language code.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    fn is_zh(&self) -> bool {
        self.language == "zh"
    }

    /// Prompt asking for a seven-section structured report.
    ///
    /// The abstract is cut to [`ABSTRACT_BUDGET`] and the body text to
    /// [`RAW_PREVIEW_BUDGET`] characters.
    pub fn interpretation(&self, extraction: &Extraction) -> (String, String) {
        let abstract_text = truncate_chars(&extraction.abstract_text, ABSTRACT_BUDGET);
        let preview = truncate_chars(&extraction.raw_text, RAW_PREVIEW_BUDGET);

        let (system, headings, sections) = if self.is_zh() {
            (
                INTERPRET_SYSTEM_ZH,
                ["# 论文标题", "# 摘要", "# 正文片段（部分）"],
                &SECTIONS_ZH,
            )
        } else {
            (
                INTERPRET_SYSTEM_EN,
                ["# Title", "# Abstract", "# Body excerpt (partial)"],
                &SECTIONS_EN,
            )
        };

        let mut user = String::with_capacity(abstract_text.len() + preview.len() + 512);
        user.push_str(&format!(
            "{}\n{}\n\n{}\n{}\n\n{}\n{}\n\n",
            headings[0], extraction.title, headings[1], abstract_text, headings[2], preview
        ));
        user.push_str(if self.is_zh() {
            "请按以下结构输出 Markdown，不要省略章节标题：\n"
        } else {
            "Use exactly this structure and keep every section heading:\n"
        });
        for (i, section) in sections.iter().enumerate() {
            user.push_str(&format!("{}. **{}**\n", i + 1, section));
        }

        (system.to_string(), user)
    }

    /// Prompt asking for a spoken-style rewrite of `interpretation`, cut to
    /// [`SCRIPT_INPUT_BUDGET`] characters.
    pub fn script(&self, interpretation: &str) -> (String, String) {
        let content = truncate_chars(interpretation, SCRIPT_INPUT_BUDGET);
        if self.is_zh() {
            (
                SCRIPT_SYSTEM_ZH.to_string(),
                format!("{SCRIPT_RULES_ZH}\n\n# 解读报告\n{content}\n"),
            )
        } else {
            (
                SCRIPT_SYSTEM_EN.to_string(),
                format!("{SCRIPT_RULES_EN}\n\n# Report\n{content}\n"),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction() -> Extraction {
        Extraction {
            title: "Deep Residual Learning".into(),
            abstract_text: "We present a residual learning framework.".into(),
            raw_text: "1 Introduction\nDeeper networks are harder to train.".into(),
            ..Extraction::default()
        }
    }

    #[test]
    fn chinese_interpretation_lists_all_sections() {
        let (system, user) = PromptBuilder::new("zh").interpretation(&extraction());

        assert!(system.contains("学术论文解读助手"));
        assert!(user.contains("Deep Residual Learning"));
        assert!(user.contains("residual learning framework"));
        for (i, section) in SECTIONS_ZH.iter().enumerate() {
            assert!(
                user.contains(&format!("{}. **{}**", i + 1, section)),
                "missing section {section}"
            );
        }
    }

    #[test]
    fn english_interpretation_embeds_body_preview() {
        let (system, user) = PromptBuilder::new("en").interpretation(&extraction());

        assert!(system.contains("Markdown"));
        assert!(user.contains("# Body excerpt (partial)"));
        assert!(user.contains("Deeper networks are harder to train."));
        assert!(user.contains("7. **One-sentence summary**"));
    }

    #[test]
    fn interpretation_inputs_are_truncated() {
        let long = Extraction {
            title: "T".into(),
            abstract_text: "a".repeat(ABSTRACT_BUDGET + 100),
            raw_text: "r".repeat(RAW_PREVIEW_BUDGET + 100),
            ..Extraction::default()
        };
        let (_, user) = PromptBuilder::new("en").interpretation(&long);

        assert!(user.contains(&"a".repeat(ABSTRACT_BUDGET)));
        assert!(!user.contains(&"a".repeat(ABSTRACT_BUDGET + 1)));
        assert!(user.contains(&"r".repeat(RAW_PREVIEW_BUDGET)));
        assert!(!user.contains(&"r".repeat(RAW_PREVIEW_BUDGET + 1)));
    }

    #[test]
    fn script_prompt_is_truncated() {
        let report = "解".repeat(SCRIPT_INPUT_BUDGET + 10);
        let (system, user) = PromptBuilder::new("zh").script(&report);

        assert!(system.contains("播客"));
        assert!(user.contains("开场白"));
        assert_eq!(user.matches('解').count(), SCRIPT_INPUT_BUDGET + 1); // +1 for "解读报告"
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let (system, user) = PromptBuilder::new("ja").script("report body");
        assert!(system.contains("podcast writer"));
        assert!(user.contains("report body"));
    }
}
