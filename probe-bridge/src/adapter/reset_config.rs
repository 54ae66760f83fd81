//! Reset line configuration of the debug adapter.
//!
//! The configuration is updated from a list of tokens. Each token belongs to exactly one
//! [`ResetCategory`]. An update only overwrites the categories it mentions, so
//! `reset_config srst_only` followed by `reset_config srst_nogate` is the same as
//! `reset_config srst_only srst_nogate`.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// The persistent reset configuration of a session.
    ///
    /// The empty set is the default: no reset lines, separate wiring, SRST gates JTAG,
    /// push-pull TRST and open-drain SRST.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResetConfig: u32 {
        /// The adapter has a TRST line.
        const HAS_TRST = 0x01;
        /// The adapter has an SRST line.
        const HAS_SRST = 0x02;
        /// Asserting SRST also asserts TRST.
        const SRST_PULLS_TRST = 0x04;
        /// Asserting TRST also asserts SRST.
        const TRST_PULLS_SRST = 0x08;
        /// TRST is driven open-drain.
        const TRST_OPEN_DRAIN = 0x10;
        /// SRST is driven push-pull.
        const SRST_PUSH_PULL = 0x20;
        /// JTAG stays usable while SRST is asserted.
        const SRST_NO_GATING = 0x40;

        const TRST_AND_SRST = Self::HAS_TRST.bits() | Self::HAS_SRST.bits();
    }
}

const SIGNAL_TOKENS: &[(&str, ResetConfig)] = &[
    ("none", ResetConfig::empty()),
    ("trst_only", ResetConfig::HAS_TRST),
    ("srst_only", ResetConfig::HAS_SRST),
    ("trst_and_srst", ResetConfig::TRST_AND_SRST),
];

const COMBINATION_TOKENS: &[(&str, ResetConfig)] = &[
    ("separate", ResetConfig::empty()),
    ("srst_pulls_trst", ResetConfig::SRST_PULLS_TRST),
    ("trst_pulls_srst", ResetConfig::TRST_PULLS_SRST),
    (
        "combined",
        ResetConfig::SRST_PULLS_TRST.union(ResetConfig::TRST_PULLS_SRST),
    ),
];

const GATING_TOKENS: &[(&str, ResetConfig)] = &[
    ("srst_gates_jtag", ResetConfig::empty()),
    ("srst_nogate", ResetConfig::SRST_NO_GATING),
];

const TRST_TYPE_TOKENS: &[(&str, ResetConfig)] = &[
    ("trst_push_pull", ResetConfig::empty()),
    ("trst_open_drain", ResetConfig::TRST_OPEN_DRAIN),
];

const SRST_TYPE_TOKENS: &[(&str, ResetConfig)] = &[
    ("srst_open_drain", ResetConfig::empty()),
    ("srst_push_pull", ResetConfig::SRST_PUSH_PULL),
];

/// One of the mutually exclusive groups of reset configuration tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, docsplay::Display)]
pub enum ResetCategory {
    /// signal
    Signals,
    /// combination
    Combination,
    /// gating
    Gating,
    /// trst_type
    TrstType,
    /// srst_type
    SrstType,
}

impl ResetCategory {
    /// All categories, in the order they are matched.
    pub const ALL: [ResetCategory; 5] = [
        ResetCategory::Gating,
        ResetCategory::Signals,
        ResetCategory::Combination,
        ResetCategory::TrstType,
        ResetCategory::SrstType,
    ];

    /// The configuration bits owned by this category.
    pub fn mask(self) -> ResetConfig {
        match self {
            ResetCategory::Signals => ResetConfig::TRST_AND_SRST,
            ResetCategory::Combination => {
                ResetConfig::SRST_PULLS_TRST | ResetConfig::TRST_PULLS_SRST
            }
            ResetCategory::Gating => ResetConfig::SRST_NO_GATING,
            ResetCategory::TrstType => ResetConfig::TRST_OPEN_DRAIN,
            ResetCategory::SrstType => ResetConfig::SRST_PUSH_PULL,
        }
    }

    /// The tokens accepted for this category, with the bits each one selects.
    pub fn tokens(self) -> &'static [(&'static str, ResetConfig)] {
        match self {
            ResetCategory::Signals => SIGNAL_TOKENS,
            ResetCategory::Combination => COMBINATION_TOKENS,
            ResetCategory::Gating => GATING_TOKENS,
            ResetCategory::TrstType => TRST_TYPE_TOKENS,
            ResetCategory::SrstType => SRST_TYPE_TOKENS,
        }
    }

    /// Finds the category of a token and the bits it selects.
    pub fn classify(token: &str) -> Option<(ResetCategory, ResetConfig)> {
        Self::ALL.into_iter().find_map(|category| {
            category
                .tokens()
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, bits)| (category, *bits))
        })
    }
}

/// An error which can occur while updating the reset configuration.
///
/// The configuration is left untouched when an update fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum ResetConfigError {
    /// extra reset_config {category} spec ({token})
    DuplicateConfigSpec {
        /// The category mentioned twice.
        category: ResetCategory,
        /// The second token of that category.
        token: String,
    },

    /// unknown reset_config flag ({0})
    UnknownConfigFlag(String),
}

impl ResetConfig {
    /// Returns the configuration resulting from applying `tokens` to `self`.
    ///
    /// Categories that are not mentioned keep their current value. An empty token list
    /// returns the configuration unchanged.
    pub fn update<S: AsRef<str>>(self, tokens: &[S]) -> Result<ResetConfig, ResetConfigError> {
        let mut touched = ResetConfig::empty();
        let mut selected = ResetConfig::empty();

        for token in tokens {
            let token = token.as_ref();
            let (category, bits) = ResetCategory::classify(token)
                .ok_or_else(|| ResetConfigError::UnknownConfigFlag(token.to_string()))?;

            if touched.intersects(category.mask()) {
                return Err(ResetConfigError::DuplicateConfigSpec {
                    category,
                    token: token.to_string(),
                });
            }

            touched |= category.mask();
            selected |= bits;
        }

        Ok(self.difference(touched) | selected)
    }

    /// Whether the adapter has a TRST line.
    pub fn has_trst(self) -> bool {
        self.contains(ResetConfig::HAS_TRST)
    }

    /// Whether the adapter has an SRST line.
    pub fn has_srst(self) -> bool {
        self.contains(ResetConfig::HAS_SRST)
    }
}

impl fmt::Display for ResetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = *self;

        let signals = match cfg & ResetConfig::TRST_AND_SRST {
            c if c == ResetConfig::TRST_AND_SRST => "trst_and_srst",
            c if c == ResetConfig::HAS_SRST => "srst_only",
            c if c == ResetConfig::HAS_TRST => "trst_only",
            _ => "none",
        };

        let both = ResetConfig::SRST_PULLS_TRST | ResetConfig::TRST_PULLS_SRST;
        let combination = match cfg & both {
            c if c == both => "combined",
            c if c == ResetConfig::SRST_PULLS_TRST => "srst_pulls_trst",
            c if c == ResetConfig::TRST_PULLS_SRST => "trst_pulls_srst",
            _ => "separate",
        };

        write!(f, "{signals} {combination}")?;

        if cfg.has_srst() {
            if cfg.contains(ResetConfig::SRST_NO_GATING) {
                write!(f, " srst_nogate")?;
            } else {
                write!(f, " srst_gates_jtag")?;
            }
        }

        if cfg.has_trst() {
            if cfg.contains(ResetConfig::TRST_OPEN_DRAIN) {
                write!(f, " trst_open_drain")?;
            } else {
                write!(f, " trst_push_pull")?;
            }
        }

        if cfg.has_srst() {
            if cfg.contains(ResetConfig::SRST_PUSH_PULL) {
                write!(f, " srst_push_pull")?;
            } else {
                write!(f, " srst_open_drain")?;
            }
        }

        Ok(())
    }
}
