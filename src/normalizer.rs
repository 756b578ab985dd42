// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps arbitrary model identifiers to a canonical family and a reasoning
//! profile (spec §4.G).

/// A canonical model family, ordered by specificity (most specific first)
/// for the substring ladder in [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Gpt52Codex,
    Gpt52,
    CodexMax,
    CodexMini,
    Codex,
    Gpt51Codex,
    Gpt51,
}

/// A reasoning effort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effort {
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
    None,
}

/// Exact-match canonical-id table (spec §4.G step 2). Extend as the vendor
/// adds aliases; entries here are the ones observed in practice.
const CANONICAL_TABLE: &[(&str, &str)] = &[
    ("gpt-5.1-codex-high", "gpt-5.1-codex"),
    ("gpt-5.1-codex-medium", "gpt-5.1-codex"),
    ("gpt-5.1-codex-low", "gpt-5.1-codex"),
];

/// Substring ladder, most specific first (spec §4.G step 3).
const LADDER: &[(&str, ModelFamily)] = &[
    ("5.2-codex", ModelFamily::Gpt52Codex),
    ("5.2", ModelFamily::Gpt52),
    ("codex-max", ModelFamily::CodexMax),
    ("codex-mini", ModelFamily::CodexMini),
    ("codex", ModelFamily::Codex),
    ("5.1-codex", ModelFamily::Gpt51Codex),
    ("5.1", ModelFamily::Gpt51),
];

/// Strip a provider prefix, canonicalize, and classify into a family.
pub fn normalize(model: &str) -> ModelFamily {
    let stripped = model.rsplit('/').next().unwrap_or(model);

    if let Some((_, canonical)) = CANONICAL_TABLE.iter().find(|(k, _)| *k == stripped) {
        return classify(canonical);
    }

    classify(stripped)
}

fn classify(model: &str) -> ModelFamily {
    let lower = model.to_lowercase();
    for (needle, family) in LADDER {
        if lower.contains(needle) {
            return *family;
        }
    }
    ModelFamily::Gpt51
}

impl ModelFamily {
    /// The canonical id string, used for logging and canonical comparisons.
    pub fn canonical_id(&self) -> &'static str {
        match self {
            Self::Gpt52Codex => "gpt-5.2-codex",
            Self::Gpt52 => "gpt-5.2",
            Self::CodexMax => "codex-max",
            Self::CodexMini => "codex-mini",
            Self::Codex => "codex",
            Self::Gpt51Codex => "gpt-5.1-codex",
            Self::Gpt51 => "gpt-5.1",
        }
    }

    /// The narrower tag used to select system-instructions text (spec §4.G:
    /// `model_family_tag ∈ { gpt-5.2-codex, codex-max, codex, gpt-5.2, gpt-5.1 }`).
    /// `codex-mini` and `gpt-5.1-codex` share the `codex` instructions text
    /// with the base `codex` family; they are agentic variants, not general
    /// chat models, so they take the agent-facing instructions rather than
    /// the general-purpose ones.
    pub fn family_tag(&self) -> &'static str {
        match self {
            Self::Gpt52Codex => "gpt-5.2-codex",
            Self::Gpt52 => "gpt-5.2",
            Self::CodexMax => "codex-max",
            Self::CodexMini | Self::Codex | Self::Gpt51Codex => "codex",
            Self::Gpt51 => "gpt-5.1",
        }
    }

    fn supports_xhigh(&self) -> bool {
        matches!(self, Self::Gpt52Codex | Self::Gpt52 | Self::CodexMax)
    }

    fn supports_none(&self) -> bool {
        matches!(self, Self::Gpt52Codex | Self::Gpt52 | Self::Gpt51)
    }

    /// Only the non-codex "general" families are lightweight enough to
    /// support `minimal` effort; agentic codex variants never run at
    /// less than `low`.
    fn supports_minimal(&self) -> bool {
        matches!(self, Self::Gpt52 | Self::Gpt51)
    }

    pub fn default_effort(&self) -> Effort {
        Effort::Medium
    }

    /// Coerce a requested effort into one this family actually supports
    /// (spec §4.G reasoning-profile rules).
    pub fn coerce_effort(&self, requested: Effort) -> Effort {
        if matches!(self, Self::CodexMini) {
            return match requested {
                Effort::High | Effort::Xhigh => Effort::High,
                _ => Effort::Medium,
            };
        }

        match requested {
            Effort::Xhigh if !self.supports_xhigh() => Effort::High,
            Effort::None if !self.supports_none() => Effort::Low,
            Effort::Minimal if !self.supports_minimal() => Effort::Low,
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
