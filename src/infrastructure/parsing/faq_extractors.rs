//! FAQ extractors
//!
//! One variant per page family. All variants read a rendered snapshot and
//! return question/answer pairs in DOM order.

use super::config::FaqStrategy;
use super::{parse_selector, text_compact, text_lines, ContextualParser, ExtractionError, ExtractionResult};
use crate::domain::faq::RawRecord;
use crate::infrastructure::config::defaults;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Per-call context: which site and page the snapshot came from
#[derive(Debug, Clone)]
pub struct FaqPageContext {
    pub site: String,
    pub source_url: String,
    pub page: u32,
}

impl FaqPageContext {
    pub fn new(site: &str, source_url: &str) -> Self {
        Self {
            site: site.to_string(),
            source_url: source_url.to_string(),
            page: 1,
        }
    }

    #[must_use]
    pub fn at_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// Compiled FAQ extraction strategy
#[derive(Debug)]
pub enum FaqExtractor {
    HeadingBody {
        container_src: String,
        container: Selector,
        headings: Selector,
        heading_tags: Vec<String>,
    },
    DefinitionList {
        question_src: String,
        question: Selector,
        answer: Option<Selector>,
        fallback_answer: Selector,
        strip: Option<Regex>,
    },
    Accordion {
        item_src: String,
        item: Selector,
        question: Selector,
        answer: Selector,
        strip: Option<Regex>,
    },
}

fn compile_strip(pattern: Option<&String>) -> ExtractionResult<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| ExtractionError::invalid_selector(p, e)))
        .transpose()
}

fn strip_prefix(strip: Option<&Regex>, text: &str) -> String {
    match strip {
        Some(re) => re.replacen(text, 1, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

impl FaqExtractor {
    pub fn from_strategy(strategy: &FaqStrategy) -> ExtractionResult<Self> {
        match strategy {
            FaqStrategy::HeadingBody { container, headings } => {
                let heading_tags: Vec<String> = headings.iter().map(|h| h.to_lowercase()).collect();
                Ok(Self::HeadingBody {
                    container_src: container.clone(),
                    container: parse_selector(container)?,
                    headings: parse_selector(&heading_tags.join(", "))?,
                    heading_tags,
                })
            }
            FaqStrategy::DefinitionList {
                question,
                answer,
                strip_prefix,
            } => Ok(Self::DefinitionList {
                question_src: question.clone(),
                question: parse_selector(question)?,
                answer: answer.as_deref().map(parse_selector).transpose()?,
                fallback_answer: parse_selector(defaults::FALLBACK_ANSWER_SELECTOR)?,
                strip: compile_strip(strip_prefix.as_ref())?,
            }),
            FaqStrategy::Accordion {
                item,
                question,
                answer,
                strip_prefix,
            } => Ok(Self::Accordion {
                item_src: item.clone(),
                item: parse_selector(item)?,
                question: parse_selector(question)?,
                answer: parse_selector(answer)?,
                strip: compile_strip(strip_prefix.as_ref())?,
            }),
        }
    }

    /// Convenience entry point over raw markup
    pub fn extract(&self, html: &str, context: &FaqPageContext) -> ExtractionResult<Vec<RawRecord>> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, context)
    }

    fn heading_body(
        &self,
        html: &Html,
        context: &FaqPageContext,
        container_src: &str,
        container: &Selector,
        headings: &Selector,
        heading_tags: &[String],
    ) -> ExtractionResult<Vec<RawRecord>> {
        let area = html
            .select(container)
            .next()
            .ok_or_else(|| ExtractionError::container_missing(&context.site, &[container_src.to_string()]))?;

        let mut records = Vec::new();
        for heading in area.select(headings) {
            let question = text_compact(heading);
            let answer_parts: Vec<String> = heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .take_while(|el| !heading_tags.iter().any(|t| t == el.value().name()))
                .map(text_lines)
                .filter(|s| !s.is_empty())
                .collect();

            if !question.is_empty() && !answer_parts.is_empty() {
                records.push(RawRecord::new(
                    &context.source_url,
                    question,
                    answer_parts.join("\n").trim().to_string(),
                ));
            }
        }
        Ok(records)
    }

    fn definition_list(
        &self,
        html: &Html,
        context: &FaqPageContext,
        question_src: &str,
        question: &Selector,
        answer: Option<&Selector>,
        fallback_answer: &Selector,
        strip: Option<&Regex>,
    ) -> ExtractionResult<Vec<RawRecord>> {
        let questions: Vec<ElementRef<'_>> = html.select(question).collect();
        if questions.is_empty() {
            return Err(ExtractionError::container_missing(&context.site, &[question_src.to_string()]));
        }

        let mut records = Vec::new();
        for q in questions {
            let question_text = strip_prefix(strip, &text_compact(q));
            if question_text.is_empty() {
                continue;
            }

            let answer_text = match answer {
                // 명시된 답변 블록이 없으면 해당 항목은 건너뛴다
                Some(answer_sel) => match q
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|el| answer_sel.matches(el))
                {
                    Some(el) => text_lines(el),
                    None => continue,
                },
                None => Self::adjacent_answer(q, fallback_answer),
            };

            records.push(RawRecord::new(&context.source_url, question_text, answer_text));
        }
        Ok(records)
    }

    /// Next sibling, else the parent's answer-like block, else the sentinel
    fn adjacent_answer(question: ElementRef<'_>, fallback: &Selector) -> String {
        if let Some(next) = question.next_siblings().find_map(ElementRef::wrap) {
            let text = text_lines(next);
            if !text.is_empty() {
                return text;
            }
        }
        question
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| parent.select(fallback).find(|el| el.id() != question.id()))
            .map(text_lines)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| defaults::NO_ANSWER_SENTINEL.to_string())
    }

    fn accordion(
        &self,
        html: &Html,
        context: &FaqPageContext,
        item_src: &str,
        item: &Selector,
        question: &Selector,
        answer: &Selector,
        strip: Option<&Regex>,
    ) -> ExtractionResult<Vec<RawRecord>> {
        let items: Vec<ElementRef<'_>> = html.select(item).collect();
        if items.is_empty() {
            return Err(ExtractionError::container_missing(&context.site, &[item_src.to_string()]));
        }

        let records: Vec<RawRecord> = items
            .into_iter()
            .filter_map(|el| {
                let q = el.select(question).next()?;
                let a = el.select(answer).next()?;
                let question_text = strip_prefix(strip, &text_compact(q));
                if question_text.is_empty() {
                    return None;
                }
                Some(RawRecord::new(&context.source_url, question_text, text_lines(a)))
            })
            .collect();

        debug!("{} page {}: {} accordion items", context.site, context.page, records.len());
        Ok(records)
    }
}

impl ContextualParser for FaqExtractor {
    type Output = Vec<RawRecord>;
    type Context = FaqPageContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ExtractionResult<Self::Output> {
        match self {
            Self::HeadingBody {
                container_src,
                container,
                headings,
                heading_tags,
            } => self.heading_body(html, context, container_src, container, headings, heading_tags),
            Self::DefinitionList {
                question_src,
                question,
                answer,
                fallback_answer,
                strip,
            } => self.definition_list(
                html,
                context,
                question_src,
                question,
                answer.as_ref(),
                fallback_answer,
                strip.as_ref(),
            ),
            Self::Accordion {
                item_src,
                item,
                question,
                answer,
                strip,
            } => self.accordion(html, context, item_src, item, question, answer, strip.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FaqPageContext {
        FaqPageContext::new("test", "https://faq.example/list")
    }

    #[test]
    fn test_heading_body_collects_siblings_until_next_heading() -> anyhow::Result<()> {
        let extractor = FaqExtractor::from_strategy(&FaqStrategy::HeadingBody {
            container: ".entry-content".into(),
            headings: vec!["h2".into(), "h3".into()],
        })?;
        let html = r#"
            <div class="entry-content">
              <h2>부가세 환급은 누가 받을 수 있나요?</h2>
              <p>일반과세자인 화물차주는</p>
              <ul><li>매입세액 공제</li></ul>
              <h3>환급 기간은 얼마나 걸리나요?</h3>
              <p>신고 후 30일 이내</p>
            </div>"#;
        let records = extractor.extract(html, &ctx())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].answer, "일반과세자인 화물차주는\n매입세액 공제");
        assert_eq!(records[1].question, "환급 기간은 얼마나 걸리나요?");
        Ok(())
    }

    #[test]
    fn test_definition_list_with_following_answer_and_prefix() -> anyhow::Result<()> {
        let extractor = FaqExtractor::from_strategy(&FaqStrategy::DefinitionList {
            question: ".faq_list".into(),
            answer: Some("div.faq_answer".into()),
            strip_prefix: Some(r"^Q\s*".into()),
        })?;
        let html = r#"
            <div class="faq_list">Q 운송사업 허가는 어디서 받나요?</div>
            <span>구분선</span>
            <div class="faq_answer"><p>관할 시청</p><p>교통과에 신청합니다.</p></div>
            <div class="faq_list">Q 답변 없는 질문입니다</div>"#;
        let records = extractor.extract(html, &ctx())?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "운송사업 허가는 어디서 받나요?");
        assert_eq!(records[0].answer, "관할 시청\n교통과에 신청합니다.");
        Ok(())
    }

    #[test]
    fn test_definition_list_fallbacks_end_in_sentinel() -> anyhow::Result<()> {
        let extractor = FaqExtractor::from_strategy(&FaqStrategy::DefinitionList {
            question: "dt".into(),
            answer: None,
            strip_prefix: None,
        })?;
        let html = r#"
            <dl><dt>첫 질문</dt><dd>바로 옆 답변</dd></dl>
            <div><dt>두 번째 질문</dt></div>"#;
        let records = extractor.extract(html, &ctx())?;
        assert_eq!(records[0].answer, "바로 옆 답변");
        assert_eq!(records[1].answer, defaults::NO_ANSWER_SENTINEL);
        Ok(())
    }

    #[test]
    fn test_accordion_missing_container_is_structural() -> anyhow::Result<()> {
        let extractor = FaqExtractor::from_strategy(&FaqStrategy::Accordion {
            item: ".cmp-accordion__item".into(),
            question: ".cmp-accordion__title".into(),
            answer: ".cmp-accordion__panel".into(),
            strip_prefix: None,
        })?;
        let err = extractor.extract("<div>nothing here</div>", &ctx()).err();
        assert!(matches!(err, Some(ExtractionError::ContainerMissing { .. })));
        Ok(())
    }

    #[test]
    fn test_accordion_strips_bracket_prefix() -> anyhow::Result<()> {
        let extractor = FaqExtractor::from_strategy(&FaqStrategy::Accordion {
            item: "li".into(),
            question: "a".into(),
            answer: "div.conts".into(),
            strip_prefix: Some(r"^\[.*?\]\s*".into()),
        })?;
        let html = r#"<ul><li><a>[검사] 정기검사 주기는?</a><div class="conts">2년마다 받습니다.</div></li></ul>"#;
        let records = extractor.extract(html, &ctx())?;
        assert_eq!(records[0].question, "정기검사 주기는?");
        Ok(())
    }
}
