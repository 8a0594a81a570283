//! Per-source outcomes and the combined context string.

use std::fmt;

/// Separator between sections of the combined context.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// A research source, in the fixed order the aggregator attempts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    DeepSeek,
    Tavily,
    Jina,
}

impl SourceKind {
    /// Label used in section headers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeepSeek => "DeepSeek AI",
            Self::Tavily => "Tavily Search",
            Self::Jina => "Jina Reader",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Succeeded(String),
    Failed(String),
}

/// Result of one attempted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    pub source: SourceKind,
    pub outcome: SourceOutcome,
}

impl SourceResult {
    pub fn succeeded_with(source: SourceKind, data: impl Into<String>) -> Self {
        Self {
            source,
            outcome: SourceOutcome::Succeeded(data.into()),
        }
    }

    pub fn failed_with(source: SourceKind, error: impl Into<String>) -> Self {
        Self {
            source,
            outcome: SourceOutcome::Failed(error.into()),
        }
    }

    pub fn provider_label(&self) -> &'static str {
        self.source.label()
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Succeeded(_))
    }

    /// Contributed text; empty for failures.
    pub fn data(&self) -> &str {
        match &self.outcome {
            SourceOutcome::Succeeded(data) => data,
            SourceOutcome::Failed(_) => "",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            SourceOutcome::Succeeded(_) => None,
            SourceOutcome::Failed(error) => Some(error),
        }
    }
}

/// Ordered results of one aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextReport {
    pub results: Vec<SourceResult>,
}

impl ContextReport {
    pub fn push(&mut self, result: SourceResult) {
        self.results.push(result);
    }

    pub fn successes(&self) -> impl Iterator<Item = &SourceResult> {
        self.results.iter().filter(|r| r.succeeded())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }

    /// Find the result recorded for `source`, if it was attempted.
    pub fn get(&self, source: SourceKind) -> Option<&SourceResult> {
        self.results.iter().find(|r| r.source == source)
    }

    /// Join every successful section in attempt order. Empty when none succeeded.
    pub fn combined(&self) -> String {
        self.successes()
            .map(|r| format!("=== {} ===\n{}", r.provider_label(), r.data()))
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }
}
